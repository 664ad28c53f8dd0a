//! Job configuration
//!
//! A [`JobConfig`] comes from a TOML file, is overridden by environment
//! variables and is validated before a job starts:
//!
//! ```toml
//! name = "line-stats"
//! parallelism = 4
//! deadline = "30s"
//!
//! [retry]
//! max_attempts = 3
//! initial_delay = "50ms"
//! ```
//!
//! | variable                    | field                |
//! |-----------------------------|----------------------|
//! | `ACCUMULATORS_PARALLELISM`  | `parallelism`        |
//! | `ACCUMULATORS_MAX_ATTEMPTS` | `retry.max_attempts` |
//! | `ACCUMULATORS_DEADLINE`     | `deadline`           |

mod loader;

pub use loader::ConfigLoader;

use crate::error::{AccumulatorError, Result};
use humantime_serde::re::humantime::parse_duration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const PARALLELISM_ENV: &str = "ACCUMULATORS_PARALLELISM";
pub const MAX_ATTEMPTS_ENV: &str = "ACCUMULATORS_MAX_ATTEMPTS";
pub const DEADLINE_ENV: &str = "ACCUMULATORS_DEADLINE";

/// Settings for one job run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// Number of parallel task instances; also the number of reports the
    /// coordinator waits for
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Time after which the job is declared failed
    #[serde(with = "humantime_serde", default)]
    pub deadline: Option<Duration>,
}

/// Retry behavior for failed task attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per task, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(with = "humantime_serde", default = "default_initial_delay")]
    pub initial_delay: Duration,

    #[serde(with = "humantime_serde", default = "default_max_delay")]
    pub max_delay: Duration,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_name() -> String {
    "accumulator-job".to_string()
}

fn default_parallelism() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            parallelism: default_parallelism(),
            retry: RetryPolicy::default(),
            deadline: None,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retrying after failed attempt number `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if delay.is_finite() {
            Duration::from_secs_f64(delay).min(self.max_delay)
        } else {
            self.max_delay
        }
    }

    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl JobConfig {
    /// Apply overrides from `ACCUMULATORS_*` environment variables
    pub fn merge_env_vars(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var(PARALLELISM_ENV) {
            self.parallelism = value
                .trim()
                .parse()
                .map_err(|_| not_a_count(PARALLELISM_ENV, &value))?;
        }

        if let Ok(value) = std::env::var(MAX_ATTEMPTS_ENV) {
            self.retry.max_attempts = value
                .trim()
                .parse()
                .map_err(|_| not_a_count(MAX_ATTEMPTS_ENV, &value))?;
        }

        if let Ok(value) = std::env::var(DEADLINE_ENV) {
            let deadline = parse_duration(value.trim()).map_err(|e| {
                AccumulatorError::invalid_config(DEADLINE_ENV, format!("'{value}': {e}"))
            })?;
            self.deadline = Some(deadline);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            return Err(AccumulatorError::invalid_config(
                "parallelism",
                "must be at least 1",
            ));
        }

        if u32::try_from(self.parallelism).is_err() {
            return Err(AccumulatorError::invalid_config(
                "parallelism",
                format!("must be at most {}", u32::MAX),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(AccumulatorError::invalid_config(
                "retry.max_attempts",
                "must be at least 1",
            ));
        }

        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(AccumulatorError::invalid_config(
                "retry.backoff_multiplier",
                "must be a finite number of at least 1.0",
            ));
        }

        if self.deadline == Some(Duration::ZERO) {
            return Err(AccumulatorError::invalid_config(
                "deadline",
                "must be greater than zero",
            ));
        }

        Ok(())
    }
}

fn not_a_count(variable: &str, value: &str) -> AccumulatorError {
    AccumulatorError::invalid_config(variable, format!("'{value}' is not a count"))
}
