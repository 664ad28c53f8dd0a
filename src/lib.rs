//! # Dataflow Accumulators
//!
//! Named aggregates for parallel dataflow jobs. Task code registers
//! accumulators under job-unique names and adds values to them while it
//! runs; when a task attempt succeeds its partial values are reported to a
//! per-job coordinator that merges them into one final value per name.
//!
//! ## Usage
//!
//! ```bash
//! accumulators run input.txt --tasks 4 [--config job.toml] [-v]
//! ```
//!
//! ## Modules
//!
//! - `accumulator` - The [`Accumulator`] capability and the built-in kinds
//! - `registry` - Per-attempt name → accumulator registry
//! - `report` - Task reports and the channel that carries them
//! - `coordinator` - Per-job merge coordinator and its actor handle
//! - `outcome` - Read side of a job's final results
//! - `task` - Task lifecycle driving user logic
//! - `engine` - In-process job execution with retries and deadlines
//! - `config` - Job configuration from TOML and the environment
//! - `app` / `cli` - The `accumulators` binary

pub mod accumulator;
pub mod app;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod outcome;
pub mod registry;
pub mod report;
pub mod task;
pub mod types;

pub use accumulator::{Accumulator, AccumulatorKind, ErasedAccumulator, KindRegistry};
pub use config::{ConfigLoader, JobConfig, RetryPolicy};
pub use coordinator::{CoordinatorHandle, CoordinatorPhase, MergeCoordinator, ReportDisposition};
pub use engine::{LocalJobExecutor, TaskFactory};
pub use error::{AccumulatorError, Result};
pub use outcome::{AccumulatorOutcome, JobOutcome, JobResult};
pub use registry::{AccumulatorHandle, AccumulatorRegistry};
pub use report::{ReportChannel, TaskReport};
pub use task::{TaskContext, TaskFunction, TaskRunner};
pub use types::{JobId, TaskAttempt, TaskId};
