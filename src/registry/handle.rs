//! Typed handles to live accumulators

use crate::accumulator::Accumulator;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cloneable handle to one accumulator in a task's registry
///
/// Handles stay valid for the whole attempt, so task code can keep one in
/// its `open` phase and keep adding values in `process` and `close`.
pub struct AccumulatorHandle<A: Accumulator> {
    name: Arc<str>,
    inner: Arc<Mutex<A>>,
}

impl<A: Accumulator> AccumulatorHandle<A> {
    pub(crate) fn new(name: Arc<str>, inner: Arc<Mutex<A>>) -> Self {
        Self { name, inner }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fold one value into the accumulator
    pub fn add(&self, value: A::Input) {
        self.lock().add(value);
    }

    /// Current local result of this task's partial value
    pub fn result(&self) -> A::Output {
        self.lock().result()
    }

    /// Run `f` with mutable access to the accumulator
    pub fn with<R>(&self, f: impl FnOnce(&mut A) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    fn lock(&self) -> MutexGuard<'_, A> {
        // A panic in task code must not make the partial value unreadable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A: Accumulator> Clone for AccumulatorHandle<A> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Accumulator> fmt::Debug for AccumulatorHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccumulatorHandle")
            .field("name", &self.name)
            .field("value", &*self.lock())
            .finish()
    }
}
