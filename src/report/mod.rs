//! Task reports and their transport to the coordinator
//!
//! A [`TaskReport`] is the immutable snapshot of one attempt's registry. It
//! is encoded as JSON for transport; every entry carries its
//! [`AccumulatorKind`](crate::accumulator::AccumulatorKind) so the coordinator
//! can rebuild and type-check values without knowing the task's source types.

mod channel;

pub use channel::{LocalReportChannel, ReportChannel};

use crate::accumulator::AccumulatorSnapshot;
use crate::error::{AccumulatorError, Result};
use crate::types::{JobId, TaskAttempt, TaskId};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Final per-name partial values of one task attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    attempt: TaskAttempt,
    created_at: DateTime<Utc>,
    entries: IndexMap<String, AccumulatorSnapshot>,
}

impl TaskReport {
    pub fn new(attempt: TaskAttempt, entries: IndexMap<String, AccumulatorSnapshot>) -> Self {
        Self {
            attempt,
            created_at: Utc::now(),
            entries,
        }
    }

    pub fn attempt(&self) -> &TaskAttempt {
        &self.attempt
    }

    pub fn job_id(&self) -> JobId {
        self.attempt.job_id
    }

    pub fn task_id(&self) -> TaskId {
        self.attempt.task_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn get(&self, name: &str) -> Option<&AccumulatorSnapshot> {
        self.entries.get(name)
    }

    /// Accumulator names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &AccumulatorSnapshot)> + '_ {
        self.entries.iter().map(|(name, snapshot)| (name.as_str(), snapshot))
    }

    pub fn into_entries(self) -> IndexMap<String, AccumulatorSnapshot> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode as a transport frame
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            AccumulatorError::serialization(format!("task report of {}", self.attempt), e)
        })
    }

    /// Decode a transport frame
    pub fn decode(frame: &[u8]) -> Result<Self> {
        serde_json::from_slice(frame)
            .map_err(|e| AccumulatorError::serialization("task report frame", e))
    }
}
