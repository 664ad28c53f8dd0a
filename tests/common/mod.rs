//! Shared helpers for job-level integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use dataflow_accumulators::{
    JobConfig, KindRegistry, LocalJobExecutor, RetryPolicy, TaskContext, TaskFunction, TaskId,
};
use std::sync::Arc;
use std::time::Duration;

type Script = dyn Fn(&mut TaskContext) -> anyhow::Result<()> + Send + Sync;

/// Task whose `process` phase runs a closure
pub struct Scripted {
    script: Arc<Script>,
}

#[async_trait]
impl TaskFunction for Scripted {
    async fn process(&mut self, ctx: &mut TaskContext) -> anyhow::Result<()> {
        (self.script)(ctx)
    }
}

/// Factory creating a [`Scripted`] task per attempt
pub fn scripted<F>(script: F) -> impl Fn(TaskId) -> Box<dyn TaskFunction> + Send + Sync + 'static
where
    F: Fn(&mut TaskContext) -> anyhow::Result<()> + Send + Sync + 'static,
{
    let script: Arc<Script> = Arc::new(script);
    move |_task_id| -> Box<dyn TaskFunction> {
        Box::new(Scripted {
            script: Arc::clone(&script),
        })
    }
}

/// Job config with fast retries
pub fn fast_config(parallelism: usize) -> JobConfig {
    JobConfig {
        name: "integration".to_string(),
        parallelism,
        retry: RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        },
        deadline: Some(Duration::from_secs(10)),
    }
}

pub fn executor(parallelism: usize) -> LocalJobExecutor {
    executor_with(fast_config(parallelism), KindRegistry::with_builtins())
}

pub fn executor_with(config: JobConfig, kinds: KindRegistry) -> LocalJobExecutor {
    LocalJobExecutor::new(config, kinds).expect("valid test configuration")
}
