//! Transport from task attempts to the job coordinator

use super::TaskReport;
use crate::coordinator::{CoordinatorHandle, ReportDisposition};
use crate::error::{AccumulatorError, Result};
use crate::types::TaskAttempt;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Channel a task attempt uses to hand its final state to the coordinator
///
/// `send` resolves only once the coordinator acknowledged the report. An
/// attempt is not complete before that.
#[async_trait]
pub trait ReportChannel: Send + Sync {
    /// Deliver the report of a successfully terminated attempt
    async fn send(&self, report: TaskReport) -> Result<ReportDisposition>;

    /// Announce that `attempt` failed; no report will follow from it
    async fn report_failure(&self, attempt: &TaskAttempt, reason: &str) -> Result<()>;
}

/// In-process channel that ships encoded report frames to a coordinator actor
#[derive(Clone)]
pub struct LocalReportChannel {
    coordinator: CoordinatorHandle,
}

impl LocalReportChannel {
    pub fn new(coordinator: CoordinatorHandle) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl ReportChannel for LocalReportChannel {
    async fn send(&self, report: TaskReport) -> Result<ReportDisposition> {
        let attempt = *report.attempt();
        let frame = report.encode().map_err(|e| AccumulatorError::TransportFailure {
            task: attempt.to_string(),
            reason: "report could not be encoded".to_string(),
            source: Some(Box::new(e)),
        })?;

        debug!("Sending {} byte report frame from {}", frame.len(), attempt);
        self.coordinator.submit_frame(attempt, frame).await
    }

    async fn report_failure(&self, attempt: &TaskAttempt, reason: &str) -> Result<()> {
        warn!("Reporting failure of {}: {}", attempt, reason);
        self.coordinator.task_failed(*attempt, reason).await
    }
}
