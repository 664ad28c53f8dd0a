//! Task lifecycle collaborator
//!
//! User logic implements [`TaskFunction`] and is driven through `open`,
//! `process` and `close` by a [`TaskRunner`]. Accumulators are available in
//! every phase through the attempt's [`TaskContext`]; the registry behind it
//! lives exactly as long as the attempt.

mod runner;

pub use runner::{AttemptOutcome, TaskRunner};

use crate::accumulator::Accumulator;
use crate::error::Result;
use crate::registry::{AccumulatorHandle, AccumulatorRegistry};
use crate::types::{TaskAttempt, TaskId};
use async_trait::async_trait;

/// User-defined logic of one parallel task instance
#[async_trait]
pub trait TaskFunction: Send {
    /// Setup phase, typically registering accumulators
    async fn open(&mut self, _ctx: &mut TaskContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn process(&mut self, ctx: &mut TaskContext) -> anyhow::Result<()>;

    /// Teardown phase; accumulators can still be updated here
    async fn close(&mut self, _ctx: &mut TaskContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Per-attempt execution context handed to [`TaskFunction`]s
#[derive(Debug)]
pub struct TaskContext {
    registry: AccumulatorRegistry,
}

impl TaskContext {
    pub fn new(attempt: TaskAttempt) -> Self {
        Self {
            registry: AccumulatorRegistry::new(attempt),
        }
    }

    pub fn attempt(&self) -> &TaskAttempt {
        self.registry.attempt()
    }

    pub fn task_id(&self) -> TaskId {
        self.registry.attempt().task_id
    }

    /// Register a new accumulator; see [`AccumulatorRegistry::register`]
    pub fn register<A: Accumulator>(
        &mut self,
        name: impl Into<String>,
        initial: A,
    ) -> Result<AccumulatorHandle<A>> {
        self.registry.register(name, initial)
    }

    /// Handle to an accumulator registered earlier in this attempt
    pub fn accumulator<A: Accumulator>(&self, name: &str) -> Result<AccumulatorHandle<A>> {
        self.registry.get(name)
    }

    pub fn get_or_register<A: Accumulator>(&mut self, name: &str) -> Result<AccumulatorHandle<A>> {
        self.registry.get_or_register(name)
    }

    pub fn registry(&self) -> &AccumulatorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut AccumulatorRegistry {
        &mut self.registry
    }

    pub(crate) fn into_registry(self) -> AccumulatorRegistry {
        self.registry
    }
}
