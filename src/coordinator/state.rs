//! Merged per-job accumulator state

use crate::accumulator::{AccumulatorKind, ErasedAccumulator};
use crate::error::{AccumulatorError, Result};
use crate::outcome::{AccumulatorOutcome, JobResult};
use crate::types::JobId;
use indexmap::IndexMap;
use tracing::debug;

/// One merged accumulator
#[derive(Debug, Clone)]
pub struct MergedAccumulator {
    kind: AccumulatorKind,
    value: Box<dyn ErasedAccumulator>,
    contributors: usize,
}

impl MergedAccumulator {
    pub fn kind(&self) -> &AccumulatorKind {
        &self.kind
    }

    pub fn value(&self) -> &dyn ErasedAccumulator {
        self.value.as_ref()
    }

    pub fn contributors(&self) -> usize {
        self.contributors
    }
}

/// Name → (kind, merged value, contributor count), owned by the coordinator
///
/// The first report carrying a name fixes that name's kind.
#[derive(Debug, Clone, Default)]
pub struct JobAccumulatorState {
    entries: IndexMap<String, MergedAccumulator>,
}

impl JobAccumulatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&MergedAccumulator> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check every incoming kind against the kinds already fixed
    pub fn validate(&self, incoming: &[(String, Box<dyn ErasedAccumulator>)]) -> Result<()> {
        for (name, value) in incoming {
            if let Some(existing) = self.entries.get(name) {
                let incoming_kind = value.accumulator_kind();
                if existing.kind != incoming_kind {
                    return Err(AccumulatorError::KindMismatch {
                        name: name.clone(),
                        existing: existing.kind.clone(),
                        incoming: incoming_kind,
                    });
                }
            }
        }
        Ok(())
    }

    /// Merge one task's decoded values
    ///
    /// Kinds are validated before anything is merged, so a failing report
    /// leaves the state untouched.
    pub fn merge_report(
        &mut self,
        incoming: Vec<(String, Box<dyn ErasedAccumulator>)>,
    ) -> Result<()> {
        self.validate(&incoming)?;

        for (name, value) in incoming {
            match self.entries.get_mut(&name) {
                Some(existing) => {
                    existing.value.merge_erased(&name, value.as_ref())?;
                    existing.contributors += 1;
                    debug!(
                        "Merged '{}' ({} contributors)",
                        name, existing.contributors
                    );
                }
                None => {
                    debug!("First value for '{}' ({})", name, value.accumulator_kind());
                    self.entries.insert(
                        name,
                        MergedAccumulator {
                            kind: value.accumulator_kind(),
                            value,
                            contributors: 1,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    /// Freeze into the immutable result
    pub fn freeze(&self, job_id: JobId) -> Result<JobResult> {
        let mut accumulators = IndexMap::with_capacity(self.entries.len());
        for (name, merged) in &self.entries {
            accumulators.insert(
                name.clone(),
                AccumulatorOutcome {
                    kind: merged.kind.clone(),
                    value: merged.value.result_json(name)?,
                    contributors: merged.contributors,
                },
            );
        }
        Ok(JobResult::new(job_id, accumulators))
    }
}
