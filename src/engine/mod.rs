//! In-process job execution
//!
//! [`LocalJobExecutor`] plays the part of the surrounding engine: it runs
//! `parallelism` task instances concurrently, retries failed attempts,
//! enforces the job deadline and declares the job failed when a task runs
//! out of attempts or a report is lost. The coordinator itself never times
//! out; the deadline lives here.

use crate::accumulator::KindRegistry;
use crate::config::{JobConfig, RetryPolicy};
use crate::coordinator::{CoordinatorHandle, MergeCoordinator};
use crate::error::{AccumulatorError, Result};
use crate::outcome::JobOutcome;
use crate::report::{LocalReportChannel, ReportChannel};
use crate::task::{AttemptOutcome, TaskFunction, TaskRunner};
use crate::types::{JobId, TaskAttempt, TaskId};
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time;
use tracing::{error, info, warn};

/// Creates the user logic for one attempt of a task
pub type TaskFactory = Arc<dyn Fn(TaskId) -> Box<dyn TaskFunction> + Send + Sync>;

/// Runs jobs inside the current process
#[derive(Debug, Clone)]
pub struct LocalJobExecutor {
    config: JobConfig,
    kinds: KindRegistry,
}

impl LocalJobExecutor {
    pub fn new(config: JobConfig, kinds: KindRegistry) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, kinds })
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Run a job whose tasks are created by `factory`
    ///
    /// Always returns the job's outcome once it reached a terminal phase
    /// or every task stopped; a failed job shows up as `Failed` in the
    /// outcome, not as an error here.
    pub async fn execute<F>(&self, factory: F) -> Result<JobOutcome>
    where
        F: Fn(TaskId) -> Box<dyn TaskFunction> + Send + Sync + 'static,
    {
        let job_id = JobId::new();
        let coordinator =
            MergeCoordinator::new(job_id, self.config.parallelism, self.kinds.clone())?;
        let handle = CoordinatorHandle::spawn(coordinator);
        self.run(handle, Arc::new(factory)).await
    }

    /// Run tasks against an already spawned coordinator
    ///
    /// Lets callers keep a handle, e.g. to cancel the job from outside.
    pub async fn run(
        &self,
        handle: CoordinatorHandle,
        factory: TaskFactory,
    ) -> Result<JobOutcome> {
        let job_id = handle.job_id();
        let channel: Arc<dyn ReportChannel> = Arc::new(LocalReportChannel::new(handle.clone()));
        let runner = TaskRunner::new(channel);

        info!(
            "Starting job '{}' ({}) with {} tasks",
            self.config.name, job_id, self.config.parallelism
        );

        let parallelism = u32::try_from(self.config.parallelism).map_err(|_| {
            AccumulatorError::invalid_config("parallelism", "does not fit a task id")
        })?;

        let mut tasks = JoinSet::new();
        for index in 0..parallelism {
            let task_id = TaskId::new(index);
            tasks.spawn(run_task(
                TaskAttempt::first(job_id, task_id),
                runner.clone(),
                handle.clone(),
                Arc::clone(&factory),
                self.config.retry.clone(),
            ));
        }

        let outcome = handle.outcome();
        let supervision = supervise(&mut tasks, &handle, &outcome);
        let finished = match self.config.deadline {
            Some(deadline) => time::timeout(deadline, supervision).await.is_ok(),
            None => {
                supervision.await;
                true
            }
        };

        if !finished {
            let deadline = self.config.deadline.unwrap_or_default();
            warn!("{} exceeded its deadline of {:?}", job_id, deadline);
            fail_job(
                &handle,
                format!("deadline of {deadline:?} elapsed before all tasks reported"),
            )
            .await;
        }
        tasks.abort_all();

        info!("Job '{}' ({}) ended in phase {}", self.config.name, job_id, outcome.phase());
        Ok(outcome)
    }
}

/// Wait for tasks until all finished or the job reached a terminal phase
async fn supervise(
    tasks: &mut JoinSet<Result<()>>,
    handle: &CoordinatorHandle,
    outcome: &JobOutcome,
) {
    loop {
        tokio::select! {
            joined = tasks.join_next() => match joined {
                None => return,
                Some(Ok(Ok(()))) => {}
                Some(Ok(Err(e))) => fail_job(handle, e.to_string()).await,
                Some(Err(e)) if e.is_cancelled() => {}
                Some(Err(e)) => fail_job(handle, format!("task supervisor panicked: {e}")).await,
            },
            // Cancelled or failed from outside, or finalized while attempts
            // are still winding down
            _ = outcome.wait() => return,
        }
    }
}

async fn fail_job(handle: &CoordinatorHandle, reason: String) {
    if let Err(e) = handle.fail_job(reason).await {
        // Finalized jobs cannot fail any more
        warn!("Could not fail {}: {}", handle.job_id(), e);
    }
}

/// Run attempts of one task until one reports or the attempts run out
async fn run_task(
    first: TaskAttempt,
    runner: TaskRunner,
    handle: CoordinatorHandle,
    factory: TaskFactory,
    retry: RetryPolicy,
) -> Result<()> {
    let mut attempt = first;

    loop {
        let reason = match run_isolated(attempt, &runner, &factory).await {
            Ok(AttemptOutcome::Reported(_)) => return Ok(()),
            Ok(AttemptOutcome::Failed { reason }) => reason,
            Err(Isolated::Panicked(reason)) => {
                handle.task_failed(attempt, reason.clone()).await?;
                reason
            }
            Err(Isolated::Delivery(e)) => {
                error!("Report from {} was not delivered: {}", attempt, e);
                if matches!(e, AccumulatorError::TransportFailure { .. }) {
                    if let Err(fail_err) = handle.transport_failed(attempt, e.to_string()).await {
                        warn!("Could not fail {}: {}", handle.job_id(), fail_err);
                    }
                }
                return Err(e);
            }
        };

        if !retry.allows_retry_after(attempt.attempt) {
            return Err(AccumulatorError::JobFailed {
                job_id: attempt.job_id,
                reason: format!(
                    "{} failed after {} attempts: {}",
                    attempt.task_id, attempt.attempt, reason
                ),
            });
        }

        let delay = retry.delay_for(attempt.attempt);
        warn!("Retrying {} in {:?}", attempt.task_id, delay);
        time::sleep(delay).await;
        attempt = attempt.retry();
    }
}

enum Isolated {
    Panicked(String),
    Delivery(AccumulatorError),
}

/// Run one attempt on its own tokio task so a panic in user code only fails
/// that attempt
async fn run_isolated(
    attempt: TaskAttempt,
    runner: &TaskRunner,
    factory: &TaskFactory,
) -> std::result::Result<AttemptOutcome, Isolated> {
    let mut task = factory(attempt.task_id);
    let runner = runner.clone();

    let mut attempt_task = AbortOnDrop(tokio::spawn(async move {
        runner.run_attempt(attempt, task.as_mut()).await
    }));

    match (&mut attempt_task.0).await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => Err(Isolated::Delivery(e)),
        Err(e) if e.is_panic() => Err(Isolated::Panicked(format!("{attempt} panicked"))),
        Err(e) => Err(Isolated::Panicked(format!("{attempt} was aborted: {e}"))),
    }
}

/// Aborts the attempt when the supervising task is aborted
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}
