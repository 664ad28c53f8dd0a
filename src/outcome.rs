//! Client-visible job results
//!
//! [`JobResult`] is the frozen, immutable set of merged accumulator results.
//! It exists only once the coordinator reached `Finalized`. [`JobOutcome`] is
//! the slot in the job outcome payload that clients read through; it refuses
//! to expose anything until the job completed and reports an explicit "job
//! did not complete" error when it failed.

use crate::accumulator::{AccumulatorKind, Numeric};
use crate::coordinator::{CoordinatorPhase, CoordinatorStatus};
use crate::error::{AccumulatorError, Result};
use crate::types::JobId;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

/// Final merged value of one accumulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorOutcome {
    pub kind: AccumulatorKind,
    pub value: Value,
    /// Number of tasks whose report carried this accumulator
    pub contributors: usize,
}

/// Immutable Name → final result mapping produced at finalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    job_id: JobId,
    finalized_at: DateTime<Utc>,
    accumulators: IndexMap<String, AccumulatorOutcome>,
}

impl JobResult {
    pub(crate) fn new(job_id: JobId, accumulators: IndexMap<String, AccumulatorOutcome>) -> Self {
        Self {
            job_id,
            finalized_at: Utc::now(),
            accumulators,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn finalized_at(&self) -> DateTime<Utc> {
        self.finalized_at
    }

    /// Final result of `name` decoded as `R`
    pub fn get_accumulator_result<R: DeserializeOwned>(&self, name: &str) -> Result<R> {
        let outcome = self.outcome(name)?;
        serde_json::from_value(outcome.value.clone()).map_err(|_| {
            AccumulatorError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<R>().to_string(),
                found: format!("result of {}", outcome.kind),
            }
        })
    }

    /// Final result of a numeric accumulator
    ///
    /// Unlike [`JobResult::get_accumulator_result`] this also reads the
    /// `"inf"`, `"-inf"` and `"NaN"` spellings of non-finite floats.
    pub fn get_numeric_result<T: Numeric>(&self, name: &str) -> Result<T> {
        let outcome = self.outcome(name)?;
        T::decode(&outcome.value).map_err(|_| AccumulatorError::TypeMismatch {
            name: name.to_string(),
            expected: T::TYPE_NAME.to_string(),
            found: format!("result of {}", outcome.kind),
        })
    }

    pub fn get_value(&self, name: &str) -> Result<&Value> {
        self.outcome(name).map(|outcome| &outcome.value)
    }

    pub fn outcome(&self, name: &str) -> Result<&AccumulatorOutcome> {
        self.accumulators
            .get(name)
            .ok_or_else(|| AccumulatorError::NotFound {
                name: name.to_string(),
            })
    }

    pub fn contributors(&self, name: &str) -> Result<usize> {
        self.outcome(name).map(|outcome| outcome.contributors)
    }

    /// Accumulator names in first-seen order
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.accumulators.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AccumulatorOutcome)> + '_ {
        self.accumulators
            .iter()
            .map(|(name, outcome)| (name.as_str(), outcome))
    }

    pub fn len(&self) -> usize {
        self.accumulators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulators.is_empty()
    }

    /// Name → value as a JSON object with names sorted
    pub fn to_json(&self) -> Value {
        let mut names: Vec<_> = self.accumulators.keys().collect();
        names.sort();

        let map = names
            .into_iter()
            .map(|name| (name.clone(), self.accumulators[name].value.clone()))
            .collect::<serde_json::Map<_, _>>();
        Value::Object(map)
    }
}

/// Read side of a job's accumulator results
///
/// Cheap to clone; any number of clients can read concurrently.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    job_id: JobId,
    status: watch::Receiver<CoordinatorStatus>,
}

impl JobOutcome {
    pub(crate) fn new(job_id: JobId, status: watch::Receiver<CoordinatorStatus>) -> Self {
        Self { job_id, status }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn status(&self) -> CoordinatorStatus {
        self.status.borrow().clone()
    }

    pub fn phase(&self) -> CoordinatorPhase {
        self.status.borrow().phase
    }

    /// The frozen results; `NotAvailable` unless the job finalized
    pub fn accumulator_results(&self) -> Result<Arc<JobResult>> {
        let status = self.status.borrow();
        match (&status.result, status.phase) {
            (Some(result), CoordinatorPhase::Finalized) => Ok(Arc::clone(result)),
            (_, CoordinatorPhase::Failed) => Err(AccumulatorError::NotAvailable {
                job_id: self.job_id,
                reason: format!(
                    "job did not complete: {}",
                    status.failure.as_deref().unwrap_or("unknown failure")
                ),
            }),
            (_, phase) => Err(AccumulatorError::NotAvailable {
                job_id: self.job_id,
                reason: format!(
                    "job has not completed ({phase}, {}/{} tasks reported)",
                    status.contributors, status.expected
                ),
            }),
        }
    }

    pub fn get_accumulator_result<R: DeserializeOwned>(&self, name: &str) -> Result<R> {
        self.accumulator_results()?.get_accumulator_result(name)
    }

    pub fn get_numeric_result<T: Numeric>(&self, name: &str) -> Result<T> {
        self.accumulator_results()?.get_numeric_result(name)
    }

    /// Wait until the coordinator reaches a terminal phase
    ///
    /// Returns the results if the job finalized and `NotAvailable` if it
    /// failed.
    pub async fn wait(&self) -> Result<Arc<JobResult>> {
        let mut status = self.status.clone();
        let reached = status
            .wait_for(|s| s.phase.is_terminal())
            .await
            .map(|_| ());

        if reached.is_err() && !self.phase().is_terminal() {
            return Err(AccumulatorError::NotAvailable {
                job_id: self.job_id,
                reason: "job did not complete: coordinator stopped".to_string(),
            });
        }

        self.accumulator_results()
    }
}
