//! Actor wrapper serializing access to a [`MergeCoordinator`]
//!
//! Reports from concurrently finishing tasks are queued on an unbounded
//! channel and applied one at a time by a background worker. Every command
//! is acknowledged through a oneshot channel, so a task knows its report was
//! handed off before it considers itself complete.

use super::{CoordinatorEvent, MergeCoordinator, ReportDisposition};
use crate::error::{AccumulatorError, Result};
use crate::outcome::JobOutcome;
use crate::report::TaskReport;
use crate::types::{JobId, TaskAttempt};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

enum Command {
    Submit {
        report: TaskReport,
        response_tx: oneshot::Sender<Result<ReportDisposition>>,
    },
    SubmitFrame {
        from: TaskAttempt,
        frame: Vec<u8>,
        response_tx: oneshot::Sender<Result<ReportDisposition>>,
    },
    TaskFailed {
        attempt: TaskAttempt,
        reason: String,
        response_tx: oneshot::Sender<()>,
    },
    TransportFailed {
        attempt: TaskAttempt,
        reason: String,
        response_tx: oneshot::Sender<Result<()>>,
    },
    FailJob {
        reason: String,
        response_tx: oneshot::Sender<Result<()>>,
    },
    Events {
        response_tx: oneshot::Sender<Vec<CoordinatorEvent>>,
    },
}

/// Cloneable handle to a coordinator running on a background task
#[derive(Clone)]
pub struct CoordinatorHandle {
    job_id: JobId,
    tx: mpsc::UnboundedSender<Command>,
    outcome: JobOutcome,
    _worker_handle: Arc<JoinHandle<()>>,
}

impl CoordinatorHandle {
    /// Move `coordinator` onto a background worker
    ///
    /// The worker runs until every handle is dropped. Must be called from
    /// within a tokio runtime.
    pub fn spawn(mut coordinator: MergeCoordinator) -> Self {
        let job_id = coordinator.job_id();
        let outcome = coordinator.outcome();
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();

        let worker_handle = tokio::spawn(async move {
            info!("Coordinator worker for {} started", job_id);
            let mut processed = 0usize;

            while let Some(command) = rx.recv().await {
                processed += 1;
                match command {
                    Command::Submit {
                        report,
                        response_tx,
                    } => {
                        let _ = response_tx.send(coordinator.receive(report));
                    }
                    Command::SubmitFrame {
                        from,
                        frame,
                        response_tx,
                    } => {
                        let result = match TaskReport::decode(&frame) {
                            Ok(report) => coordinator.receive(report),
                            Err(e) => {
                                let reason = format!("undecodable report frame: {e}");
                                if let Err(fail_err) = coordinator.transport_failed(from, &reason)
                                {
                                    warn!("Could not fail {}: {}", coordinator.job_id(), fail_err);
                                }
                                Err(AccumulatorError::TransportFailure {
                                    task: from.to_string(),
                                    reason,
                                    source: Some(Box::new(e)),
                                })
                            }
                        };
                        let _ = response_tx.send(result);
                    }
                    Command::TaskFailed {
                        attempt,
                        reason,
                        response_tx,
                    } => {
                        coordinator.task_failed(attempt, &reason);
                        let _ = response_tx.send(());
                    }
                    Command::TransportFailed {
                        attempt,
                        reason,
                        response_tx,
                    } => {
                        let _ = response_tx.send(coordinator.transport_failed(attempt, &reason));
                    }
                    Command::FailJob {
                        reason,
                        response_tx,
                    } => {
                        let _ = response_tx.send(coordinator.fail_job(&reason));
                    }
                    Command::Events { response_tx } => {
                        let _ = response_tx.send(coordinator.events().to_vec());
                    }
                }
            }

            info!(
                "Coordinator worker for {} shutting down in phase {} (processed {} commands)",
                job_id,
                coordinator.phase(),
                processed
            );
        });

        Self {
            job_id,
            tx,
            outcome,
            _worker_handle: Arc::new(worker_handle),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Client-facing view of this job's results
    pub fn outcome(&self) -> JobOutcome {
        self.outcome.clone()
    }

    /// Hand a report to the coordinator and wait for the acknowledgement
    pub async fn submit(&self, report: TaskReport) -> Result<ReportDisposition> {
        let from = report.attempt().to_string();
        debug!("Submitting report from {}", from);
        self.request(&from, |response_tx| Command::Submit {
            report,
            response_tx,
        })
        .await?
    }

    /// Hand an encoded report frame to the coordinator
    ///
    /// A frame that cannot be decoded is a transport failure and fails the
    /// job.
    pub async fn submit_frame(
        &self,
        from: TaskAttempt,
        frame: Vec<u8>,
    ) -> Result<ReportDisposition> {
        self.request(&from.to_string(), |response_tx| Command::SubmitFrame {
            from,
            frame,
            response_tx,
        })
        .await?
    }

    /// Declare `attempt` failed so its report is never merged
    pub async fn task_failed(
        &self,
        attempt: TaskAttempt,
        reason: impl Into<String>,
    ) -> Result<()> {
        let reason = reason.into();
        self.request(&attempt.to_string(), |response_tx| Command::TaskFailed {
            attempt,
            reason,
            response_tx,
        })
        .await
    }

    /// Report that `attempt`'s report was lost; fails the job
    pub async fn transport_failed(
        &self,
        attempt: TaskAttempt,
        reason: impl Into<String>,
    ) -> Result<()> {
        let reason = reason.into();
        self.request(&attempt.to_string(), |response_tx| {
            Command::TransportFailed {
                attempt,
                reason,
                response_tx,
            }
        })
        .await?
    }

    /// Declare the job failed, e.g. when its deadline elapsed
    pub async fn fail_job(&self, reason: impl Into<String>) -> Result<()> {
        let reason = reason.into();
        self.request("job", |response_tx| Command::FailJob {
            reason,
            response_tx,
        })
        .await?
    }

    pub async fn cancel(&self) -> Result<()> {
        self.fail_job("job was cancelled").await
    }

    /// Audit trail recorded so far
    pub async fn events(&self) -> Result<Vec<CoordinatorEvent>> {
        self.request("job", |response_tx| Command::Events { response_tx })
            .await
    }

    async fn request<T>(
        &self,
        from: &str,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T> {
        let (response_tx, response_rx) = oneshot::channel();

        if self.tx.send(command(response_tx)).is_err() {
            warn!("Coordinator for {} is gone; {} not delivered", self.job_id, from);
            return Err(AccumulatorError::transport(
                from,
                "coordinator is no longer running",
            ));
        }

        response_rx.await.map_err(|_| {
            AccumulatorError::transport(from, "coordinator dropped the request")
        })
    }
}
