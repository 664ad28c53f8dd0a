//! Per-job merge coordinator
//!
//! The coordinator owns the job's [`JobAccumulatorState`]. It accepts at most
//! one report per logical task, merges reports in arrival order and freezes
//! the merged state into a [`JobResult`] once every expected task reported.
//!
//! ```text
//! Collecting ──(all tasks reported)──▶ Finalizing ──▶ Finalized
//!     │                                    │
//!     └──(kind mismatch, transport failure, cancel, job failed)──▶ Failed
//! ```
//!
//! [`MergeCoordinator`] is the synchronous core. [`CoordinatorHandle`] runs
//! it as an actor so that reports from concurrently finishing tasks are
//! applied one at a time.

mod actor;
mod phase;
mod state;

#[cfg(test)]
mod tests;

pub use actor::CoordinatorHandle;
pub use phase::{CoordinatorPhase, PhaseMachine};
pub use state::{JobAccumulatorState, MergedAccumulator};

use crate::accumulator::{ErasedAccumulator, KindRegistry};
use crate::error::{AccumulatorError, Result};
use crate::outcome::{JobOutcome, JobResult};
use crate::report::TaskReport;
use crate::types::{JobId, TaskAttempt, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Why a report was not merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// Report belongs to another job
    WrongJob,
    /// Coordinator no longer collecting
    NotCollecting,
    /// Task index outside `0..expected_tasks`
    UnknownTask,
    /// The attempt was declared failed
    FailedAttempt,
    /// Another attempt of the same task already contributed
    DuplicateTask,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::WrongJob => "report belongs to another job",
            Self::NotCollecting => "coordinator is no longer collecting",
            Self::UnknownTask => "task is not part of this job",
            Self::FailedAttempt => "attempt was declared failed",
            Self::DuplicateTask => "task already contributed",
        };
        f.write_str(reason)
    }
}

/// What happened to a submitted report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportDisposition {
    /// Merged; more tasks are still expected
    Merged { contributors: usize, expected: usize },
    /// Merged as the last expected report; results are published
    Finalized,
    /// Not merged
    Discarded(DiscardReason),
}

impl ReportDisposition {
    pub fn is_merged(&self) -> bool {
        !matches!(self, Self::Discarded(_))
    }
}

/// Snapshot of coordinator progress published to clients
#[derive(Debug, Clone)]
pub struct CoordinatorStatus {
    pub phase: CoordinatorPhase,
    pub contributors: usize,
    pub expected: usize,
    /// Present only in `Finalized`
    pub result: Option<Arc<JobResult>>,
    /// Present only in `Failed`
    pub failure: Option<String>,
}

impl CoordinatorStatus {
    pub fn collecting(expected: usize) -> Self {
        Self {
            phase: CoordinatorPhase::Collecting,
            contributors: 0,
            expected,
            result: None,
            failure: None,
        }
    }
}

/// Audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: CoordinatorEventType,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoordinatorEventType {
    PhaseTransition {
        from: CoordinatorPhase,
        to: CoordinatorPhase,
    },
    ReportMerged {
        attempt: TaskAttempt,
    },
    ReportDiscarded {
        attempt: TaskAttempt,
        reason: DiscardReason,
    },
    AttemptFailed {
        attempt: TaskAttempt,
    },
    JobFailed {
        reason: String,
    },
}

/// Merges task reports for one job
pub struct MergeCoordinator {
    job_id: JobId,
    expected_tasks: usize,
    kinds: KindRegistry,
    phase: CoordinatorPhase,
    transitions: PhaseMachine,
    state: JobAccumulatorState,
    contributed: HashSet<TaskId>,
    failed_attempts: HashSet<TaskAttempt>,
    result: Option<Arc<JobResult>>,
    failure: Option<String>,
    audit_log: Vec<CoordinatorEvent>,
    status_tx: watch::Sender<CoordinatorStatus>,
}

impl MergeCoordinator {
    /// Coordinator for `job_id` expecting one report from each of
    /// `expected_tasks` tasks
    pub fn new(job_id: JobId, expected_tasks: usize, kinds: KindRegistry) -> Result<Self> {
        if expected_tasks == 0 {
            return Err(AccumulatorError::invalid_config(
                "expected_tasks",
                "a job needs at least one task",
            ));
        }

        let (status_tx, _) = watch::channel(CoordinatorStatus::collecting(expected_tasks));
        info!(
            "Coordinator for {} collecting reports from {} tasks",
            job_id, expected_tasks
        );

        Ok(Self {
            job_id,
            expected_tasks,
            kinds,
            phase: CoordinatorPhase::Collecting,
            transitions: PhaseMachine::new(),
            state: JobAccumulatorState::new(),
            contributed: HashSet::new(),
            failed_attempts: HashSet::new(),
            result: None,
            failure: None,
            audit_log: Vec::new(),
            status_tx,
        })
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn expected_tasks(&self) -> usize {
        self.expected_tasks
    }

    pub fn phase(&self) -> CoordinatorPhase {
        self.phase
    }

    pub fn contributors(&self) -> usize {
        self.contributed.len()
    }

    pub fn state(&self) -> &JobAccumulatorState {
        &self.state
    }

    pub fn events(&self) -> &[CoordinatorEvent] {
        &self.audit_log
    }

    pub fn status(&self) -> CoordinatorStatus {
        self.status_tx.borrow().clone()
    }

    /// Client-facing view that follows this coordinator's progress
    pub fn outcome(&self) -> JobOutcome {
        JobOutcome::new(self.job_id, self.status_tx.subscribe())
    }

    /// The frozen result; `NotAvailable` unless finalized
    pub fn result(&self) -> Result<Arc<JobResult>> {
        match (&self.result, self.phase) {
            (Some(result), CoordinatorPhase::Finalized) => Ok(Arc::clone(result)),
            (_, CoordinatorPhase::Failed) => Err(AccumulatorError::NotAvailable {
                job_id: self.job_id,
                reason: format!(
                    "job did not complete: {}",
                    self.failure.as_deref().unwrap_or("unknown failure")
                ),
            }),
            (_, phase) => Err(AccumulatorError::NotAvailable {
                job_id: self.job_id,
                reason: format!("job has not completed ({phase})"),
            }),
        }
    }

    /// Apply one task report
    ///
    /// Anomalous reports are discarded and logged; they never produce an
    /// error. An error means the report failed the job: the coordinator is
    /// `Failed` afterwards.
    pub fn receive(&mut self, report: TaskReport) -> Result<ReportDisposition> {
        let attempt = *report.attempt();

        if let Some(reason) = self.discard_reason(&attempt) {
            return Ok(self.discard(attempt, reason));
        }

        match self.merge(report) {
            Ok(()) => {}
            Err(e) => {
                self.fail(format!("report from {attempt} could not be merged: {e}"));
                return Err(e);
            }
        }

        self.contributed.insert(attempt.task_id);
        self.log_event(CoordinatorEventType::ReportMerged { attempt }, None);
        debug!(
            "Merged report from {} ({}/{})",
            attempt,
            self.contributors(),
            self.expected_tasks
        );

        if self.contributors() < self.expected_tasks {
            self.publish();
            return Ok(ReportDisposition::Merged {
                contributors: self.contributors(),
                expected: self.expected_tasks,
            });
        }

        self.finalize()?;
        Ok(ReportDisposition::Finalized)
    }

    /// Mark `attempt` as failed; its report will never be merged
    pub fn task_failed(&mut self, attempt: TaskAttempt, reason: &str) {
        warn!("{} failed: {}", attempt, reason);
        self.failed_attempts.insert(attempt);
        self.log_event(
            CoordinatorEventType::AttemptFailed { attempt },
            Some(reason.to_string()),
        );
    }

    /// A report could not be delivered; fatal to the job
    pub fn transport_failed(&mut self, attempt: TaskAttempt, reason: &str) -> Result<()> {
        self.failed_attempts.insert(attempt);
        self.fail_job(&format!("report from {attempt} was lost: {reason}"))
    }

    /// Declare the job failed
    ///
    /// Idempotent once failed; a finalized job cannot fail any more.
    pub fn fail_job(&mut self, reason: &str) -> Result<()> {
        match self.phase {
            CoordinatorPhase::Failed => Ok(()),
            phase => {
                self.transitions.check(phase, CoordinatorPhase::Failed)?;
                self.fail(reason.to_string());
                Ok(())
            }
        }
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.fail_job("job was cancelled")
    }

    fn discard_reason(&self, attempt: &TaskAttempt) -> Option<DiscardReason> {
        if attempt.job_id != self.job_id {
            Some(DiscardReason::WrongJob)
        } else if self.phase != CoordinatorPhase::Collecting {
            Some(DiscardReason::NotCollecting)
        } else if attempt.task_id.index() as usize >= self.expected_tasks {
            Some(DiscardReason::UnknownTask)
        } else if self.failed_attempts.contains(attempt) {
            Some(DiscardReason::FailedAttempt)
        } else if self.contributed.contains(&attempt.task_id) {
            Some(DiscardReason::DuplicateTask)
        } else {
            None
        }
    }

    fn discard(&mut self, attempt: TaskAttempt, reason: DiscardReason) -> ReportDisposition {
        warn!(
            "Discarding report from {} in phase {}: {}",
            attempt, self.phase, reason
        );
        self.log_event(
            CoordinatorEventType::ReportDiscarded { attempt, reason },
            None,
        );
        ReportDisposition::Discarded(reason)
    }

    fn merge(&mut self, report: TaskReport) -> Result<()> {
        let mut decoded: Vec<(String, Box<dyn ErasedAccumulator>)> =
            Vec::with_capacity(report.len());
        for (name, snapshot) in report.into_entries() {
            let value = self.kinds.decode(&name, snapshot)?;
            decoded.push((name, value));
        }
        self.state.merge_report(decoded)
    }

    fn finalize(&mut self) -> Result<()> {
        self.transition(CoordinatorPhase::Finalizing)?;

        let result = match self.state.freeze(self.job_id) {
            Ok(result) => result,
            Err(e) => {
                self.fail(format!("results could not be finalized: {e}"));
                return Err(e);
            }
        };

        self.result = Some(Arc::new(result));
        self.transition(CoordinatorPhase::Finalized)?;
        info!(
            "{} finalized {} accumulators from {} tasks",
            self.job_id,
            self.state.len(),
            self.expected_tasks
        );
        Ok(())
    }

    fn fail(&mut self, reason: String) {
        if self.phase.is_terminal() {
            return;
        }

        error!("{} failed: {}", self.job_id, reason);
        let from = self.phase;
        self.phase = CoordinatorPhase::Failed;
        self.result = None;
        self.failure = Some(reason.clone());
        self.log_event(
            CoordinatorEventType::PhaseTransition {
                from,
                to: CoordinatorPhase::Failed,
            },
            None,
        );
        self.log_event(CoordinatorEventType::JobFailed { reason }, None);
        self.publish();
    }

    fn transition(&mut self, to: CoordinatorPhase) -> Result<()> {
        let from = self.phase;
        self.transitions.check(from, to)?;
        self.phase = to;
        debug!("{} transitioned from {} to {}", self.job_id, from, to);
        self.log_event(CoordinatorEventType::PhaseTransition { from, to }, None);
        self.publish();
        Ok(())
    }

    fn publish(&self) {
        self.status_tx.send_replace(CoordinatorStatus {
            phase: self.phase,
            contributors: self.contributors(),
            expected: self.expected_tasks,
            result: self
                .result
                .as_ref()
                .filter(|_| self.phase == CoordinatorPhase::Finalized)
                .cloned(),
            failure: self.failure.clone(),
        });
    }

    fn log_event(&mut self, event_type: CoordinatorEventType, details: Option<String>) {
        self.audit_log.push(CoordinatorEvent {
            timestamp: Utc::now(),
            event_type,
            details,
        });
    }
}

impl fmt::Debug for MergeCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeCoordinator")
            .field("job_id", &self.job_id)
            .field("phase", &self.phase)
            .field("contributors", &self.contributors())
            .field("expected_tasks", &self.expected_tasks)
            .finish()
    }
}
