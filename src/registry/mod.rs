//! Per-attempt accumulator registry
//!
//! Every task attempt owns exactly one [`AccumulatorRegistry`]. Task code
//! registers accumulators by name and mutates them through
//! [`AccumulatorHandle`]s; when the attempt terminates successfully the
//! registry is consumed by [`AccumulatorRegistry::snapshot`] into the
//! immutable [`TaskReport`] that is shipped to the coordinator.

mod handle;

pub use handle::AccumulatorHandle;

use crate::accumulator::{Accumulator, AccumulatorKind, AccumulatorSnapshot, ErasedAccumulator};
use crate::error::{AccumulatorError, Result};
use crate::report::TaskReport;
use crate::types::TaskAttempt;
use indexmap::IndexMap;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Live registry entry shared with the handles given to task code
trait RegistryEntry: Send + Sync {
    fn kind(&self) -> AccumulatorKind;

    fn type_name(&self) -> &'static str;

    fn add_json(&self, name: &str, value: Value) -> Result<()>;

    fn snapshot(&self, name: &str) -> Result<AccumulatorSnapshot>;

    fn as_any(&self) -> &dyn Any;
}

impl<A: Accumulator> RegistryEntry for Arc<Mutex<A>> {
    fn kind(&self) -> AccumulatorKind {
        A::kind()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<A>()
    }

    fn add_json(&self, name: &str, value: Value) -> Result<()> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_json(name, value)
    }

    fn snapshot(&self, name: &str) -> Result<AccumulatorSnapshot> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .to_snapshot(name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Name → accumulator mapping scoped to one task attempt
pub struct AccumulatorRegistry {
    attempt: TaskAttempt,
    entries: IndexMap<Arc<str>, Box<dyn RegistryEntry>>,
}

impl AccumulatorRegistry {
    pub fn new(attempt: TaskAttempt) -> Self {
        Self {
            attempt,
            entries: IndexMap::new(),
        }
    }

    pub fn attempt(&self) -> &TaskAttempt {
        &self.attempt
    }

    /// Register `initial` under `name`
    ///
    /// Each name can be registered once per attempt, whatever its kind.
    pub fn register<A: Accumulator>(
        &mut self,
        name: impl Into<String>,
        initial: A,
    ) -> Result<AccumulatorHandle<A>> {
        let name: Arc<str> = Arc::from(name.into());
        if self.entries.contains_key(&name) {
            return Err(AccumulatorError::DuplicateName {
                name: name.to_string(),
                task: self.attempt.to_string(),
            });
        }

        debug!(
            "Registered accumulator '{}' ({}) in {}",
            name,
            A::kind(),
            self.attempt
        );

        let inner = Arc::new(Mutex::new(initial));
        self.entries
            .insert(Arc::clone(&name), Box::new(Arc::clone(&inner)));
        Ok(AccumulatorHandle::new(name, inner))
    }

    /// Handle to the live accumulator registered under `name`
    pub fn get<A: Accumulator>(&self, name: &str) -> Result<AccumulatorHandle<A>> {
        let (key, entry) =
            self.entries
                .get_key_value(name)
                .ok_or_else(|| AccumulatorError::NotFound {
                    name: name.to_string(),
                })?;

        let inner = entry
            .as_any()
            .downcast_ref::<Arc<Mutex<A>>>()
            .ok_or_else(|| AccumulatorError::TypeMismatch {
                name: name.to_string(),
                expected: A::kind().to_string(),
                found: entry.kind().to_string(),
            })?;

        Ok(AccumulatorHandle::new(Arc::clone(key), Arc::clone(inner)))
    }

    /// Existing handle for `name`, or a freshly registered default value
    pub fn get_or_register<A: Accumulator>(&mut self, name: &str) -> Result<AccumulatorHandle<A>> {
        if self.entries.contains_key(name) {
            self.get(name)
        } else {
            self.register(name, A::default())
        }
    }

    /// Add a dynamically typed value to the accumulator registered under `name`
    pub fn add_json(&self, name: &str, value: Value) -> Result<()> {
        self.entries
            .get(name)
            .ok_or_else(|| AccumulatorError::NotFound {
                name: name.to_string(),
            })?
            .add_json(name, value)
    }

    /// Kind registered under `name`
    pub fn kind_of(&self, name: &str) -> Option<AccumulatorKind> {
        self.entries.get(name).map(|entry| entry.kind())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(|name| name.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze every entry into the attempt's report
    ///
    /// Consumes the registry, so a report is produced at most once per
    /// attempt. Handles still held by task code keep working but no longer
    /// affect the report.
    pub fn snapshot(self) -> Result<TaskReport> {
        let mut snapshots = IndexMap::with_capacity(self.entries.len());
        for (name, entry) in &self.entries {
            snapshots.insert(name.to_string(), entry.snapshot(name)?);
        }

        debug!(
            "Snapshotted {} accumulators for {}",
            snapshots.len(),
            self.attempt
        );

        Ok(TaskReport::new(self.attempt, snapshots))
    }
}

impl fmt::Debug for AccumulatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<_> = self
            .entries
            .iter()
            .map(|(name, entry)| (name.as_ref(), entry.type_name()))
            .collect();

        f.debug_struct("AccumulatorRegistry")
            .field("attempt", &self.attempt)
            .field("entries", &entries)
            .finish()
    }
}
