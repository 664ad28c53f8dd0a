//! Structured error types for accumulator operations
//!
//! Registration errors (`DuplicateName`, `NotFound`, `TypeMismatch`) surface
//! synchronously to the task code that caused them. Merge and transport
//! errors are fatal to the job's accumulator subsystem: the coordinator moves
//! to `Failed` and no result is ever produced.

use crate::accumulator::AccumulatorKind;
use crate::coordinator::CoordinatorPhase;
use crate::types::JobId;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

/// Result alias used throughout the crate
pub type Result<T, E = AccumulatorError> = std::result::Result<T, E>;

/// Main error type for accumulator operations
#[derive(Debug, Error)]
pub enum AccumulatorError {
    #[error("Accumulator '{name}' is already registered in {task}")]
    DuplicateName { name: String, task: String },

    #[error("Accumulator '{name}' not found")]
    NotFound { name: String },

    #[error("Type mismatch for accumulator '{name}': expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("Kind mismatch for accumulator '{name}': existing kind {existing}, incoming kind {incoming}")]
    KindMismatch {
        name: String,
        existing: AccumulatorKind,
        incoming: AccumulatorKind,
    },

    #[error("Accumulator '{name}' has unregistered kind {kind}")]
    UnknownKind { name: String, kind: AccumulatorKind },

    #[error("Accumulator results for {job_id} are not available: {reason}")]
    NotAvailable { job_id: JobId, reason: String },

    #[error("Report transport failed for {task}: {reason}")]
    TransportFailure {
        task: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid coordinator transition from {from} to {to}")]
    InvalidTransition {
        from: CoordinatorPhase,
        to: CoordinatorPhase,
    },

    #[error("Failed to serialize {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("{job_id} failed: {reason}")]
    JobFailed { job_id: JobId, reason: String },
}

impl AccumulatorError {
    /// Stable numeric code for this error
    pub fn code(&self) -> u16 {
        match self {
            Self::DuplicateName { .. } => ErrorCode::DUPLICATE_NAME,
            Self::NotFound { .. } => ErrorCode::NOT_FOUND,
            Self::TypeMismatch { .. } => ErrorCode::TYPE_MISMATCH,
            Self::KindMismatch { .. } => ErrorCode::KIND_MISMATCH,
            Self::UnknownKind { .. } => ErrorCode::UNKNOWN_KIND,
            Self::NotAvailable { .. } => ErrorCode::NOT_AVAILABLE,
            Self::TransportFailure { .. } => ErrorCode::TRANSPORT_FAILURE,
            Self::InvalidTransition { .. } => ErrorCode::INVALID_TRANSITION,
            Self::Serialization { .. } => ErrorCode::SERIALIZATION,
            Self::InvalidConfiguration { .. } => ErrorCode::INVALID_CONFIGURATION,
            Self::JobFailed { .. } => ErrorCode::JOB_FAILED,
        }
    }

    /// Whether this error ends the job's accumulator subsystem
    ///
    /// `Serialization` counts: a report whose state cannot be decoded fails
    /// the job in the coordinator.
    pub fn is_fatal_to_job(&self) -> bool {
        matches!(
            self,
            Self::KindMismatch { .. }
                | Self::UnknownKind { .. }
                | Self::TransportFailure { .. }
                | Self::Serialization { .. }
                | Self::JobFailed { .. }
        )
    }

    /// Process exit code used by the binary when this error is fatal
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfiguration { .. } => 2,
            Self::NotAvailable { .. } | Self::JobFailed { .. } => 3,
            _ => 1,
        }
    }

    /// Message shown to end users, prefixed with the error code
    pub fn user_message(&self) -> String {
        format!("[E{:04}] {}", self.code(), self)
    }

    /// Message with the code description and the full source chain
    pub fn developer_message(&self) -> String {
        let mut message = format!(
            "[E{:04}] {}\n  {}",
            self.code(),
            self,
            describe_error_code(self.code())
        );

        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(&format!("\n  caused by: {cause}"));
            source = cause.source();
        }

        message
    }

    pub fn transport(task: impl ToString, reason: impl Into<String>) -> Self {
        Self::TransportFailure {
            task: task.to_string(),
            reason: reason.into(),
            source: None,
        }
    }

    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
