//! Coordinator phases and their transition table

use crate::error::{AccumulatorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lifecycle phase of a job's merge coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorPhase {
    /// Accepting task reports
    Collecting,
    /// Every expected task reported; freezing the result
    Finalizing,
    /// Result published (terminal)
    Finalized,
    /// Job did not complete; no result will ever be produced (terminal)
    Failed,
}

impl CoordinatorPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Failed)
    }
}

impl fmt::Display for CoordinatorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Collecting => "collecting",
            Self::Finalizing => "finalizing",
            Self::Finalized => "finalized",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Valid phase transitions
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    transitions: HashMap<CoordinatorPhase, Vec<CoordinatorPhase>>,
}

impl PhaseMachine {
    pub fn new() -> Self {
        use CoordinatorPhase::*;

        let mut transitions = HashMap::new();
        transitions.insert(Collecting, vec![Finalizing, Failed]);
        transitions.insert(Finalizing, vec![Finalized, Failed]);
        transitions.insert(Finalized, vec![]); // Terminal state
        transitions.insert(Failed, vec![]); // Terminal state

        Self { transitions }
    }

    pub fn is_valid_transition(&self, from: CoordinatorPhase, to: CoordinatorPhase) -> bool {
        self.transitions
            .get(&from)
            .map(|valid| valid.contains(&to))
            .unwrap_or(false)
    }

    pub fn valid_transitions(&self, from: CoordinatorPhase) -> Vec<CoordinatorPhase> {
        self.transitions.get(&from).cloned().unwrap_or_default()
    }

    /// Ok if `from → to` is allowed, `InvalidTransition` otherwise
    pub fn check(&self, from: CoordinatorPhase, to: CoordinatorPhase) -> Result<()> {
        if self.is_valid_transition(from, to) {
            Ok(())
        } else {
            Err(AccumulatorError::InvalidTransition { from, to })
        }
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}
