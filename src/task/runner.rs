//! Drives one task attempt and hands its report to the coordinator

use super::{TaskContext, TaskFunction};
use crate::coordinator::ReportDisposition;
use crate::error::Result;
use crate::report::ReportChannel;
use crate::types::TaskAttempt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How an attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// User code succeeded and the coordinator acknowledged the report
    Reported(ReportDisposition),
    /// User code failed; no report was sent
    Failed { reason: String },
}

/// Runs task attempts against a report channel
#[derive(Clone)]
pub struct TaskRunner {
    channel: Arc<dyn ReportChannel>,
}

impl TaskRunner {
    pub fn new(channel: Arc<dyn ReportChannel>) -> Self {
        Self { channel }
    }

    /// Run `task` as `attempt`
    ///
    /// On success the registry is snapshotted and sent; the attempt is only
    /// complete once the coordinator acknowledged it. On failure the channel
    /// is told so and nothing partial is ever sent. An error means the report
    /// could not be delivered.
    pub async fn run_attempt(
        &self,
        attempt: TaskAttempt,
        task: &mut dyn TaskFunction,
    ) -> Result<AttemptOutcome> {
        debug!("Starting {}", attempt);
        let mut ctx = TaskContext::new(attempt);

        if let Err(e) = run_phases(task, &mut ctx).await {
            return self.fail(attempt, format!("{e:#}")).await;
        }

        let report = match ctx.into_registry().snapshot() {
            Ok(report) => report,
            Err(e) => return self.fail(attempt, e.to_string()).await,
        };

        let disposition = self.channel.send(report).await?;
        info!("{} reported: {:?}", attempt, disposition);
        Ok(AttemptOutcome::Reported(disposition))
    }

    async fn fail(&self, attempt: TaskAttempt, reason: String) -> Result<AttemptOutcome> {
        warn!("{} failed: {}", attempt, reason);
        self.channel.report_failure(&attempt, &reason).await?;
        Ok(AttemptOutcome::Failed { reason })
    }
}

async fn run_phases(task: &mut dyn TaskFunction, ctx: &mut TaskContext) -> anyhow::Result<()> {
    task.open(ctx).await?;
    task.process(ctx).await?;
    task.close(ctx).await
}
