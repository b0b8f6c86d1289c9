//! Error taxonomy shared by rows, pipelines, and parallel execution.
//!
//! Chain operations validate their arguments when they are called and return
//! [`EtlError::Argument`] or [`EtlError::Range`] right away. Everything that can
//! only go wrong while data flows (conversion, user closures, adapters, worker
//! failures) is reported by the terminal call that triggered execution.
//!
//! Adapters under [`crate::io`] keep using `anyhow` internally; their failures
//! reach pipeline callers as [`EtlError::Adapter`].

use crate::validation::ValidationError;
use std::fmt;
use thiserror::Error;

/// Convenience result type used across the crate.
pub type Result<T, E = EtlError> = std::result::Result<T, E>;

/// Every failure a pipeline can surface to its caller.
#[derive(Debug, Error)]
pub enum EtlError {
    /// An argument handed to a chain operation or constructor was invalid.
    #[error("invalid argument `{name}`: {reason}")]
    Argument { name: &'static str, reason: String },

    /// A signed count was negative.
    #[error("`{name}` must be non-negative, got {value}")]
    Range { name: &'static str, value: i64 },

    /// A typed field read could not coerce the stored value.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// A typed field read referenced a field the row does not have.
    #[error("field '{field}' not found")]
    FieldNotFound { field: String },

    /// `first()` on a pipeline that produced nothing.
    #[error("sequence contains no elements")]
    Empty,

    /// One or more parallel workers failed; the whole stage is discarded.
    #[error(transparent)]
    Aggregate(#[from] AggregateFailure),

    /// A fallible user closure (`try_map`, `try_filter`, ...) returned an error.
    #[error("{stage} failed: {cause:#}")]
    Stage {
        stage: &'static str,
        cause: anyhow::Error,
    },

    /// A record failed validation under [`ValidationMode::FailFast`](crate::validation::ValidationMode::FailFast).
    #[error("validation failed at record {record}: {}", format_validation(.errors))]
    Validation {
        record: usize,
        errors: Vec<ValidationError>,
    },

    /// Execution observed a cancelled [`CancelToken`](crate::cancel::CancelToken).
    #[error("pipeline execution cancelled")]
    Cancelled,

    /// The worker pool for a parallel pipeline could not be built.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The background task driving an async terminal did not complete.
    #[cfg(feature = "async")]
    #[error("background execution failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A source or sink adapter failed (I/O, parsing, serialization).
    #[error(transparent)]
    Adapter(#[from] anyhow::Error),
}

impl EtlError {
    pub(crate) fn argument(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Argument {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn stage(stage: &'static str, cause: anyhow::Error) -> Self {
        Self::Stage { stage, cause }
    }
}

fn format_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A stored value could not be represented as the requested type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert field '{field}' from {source_type} to {target_type}")]
pub struct ConversionError {
    /// Field that was read.
    pub field: String,
    /// Variant name of the stored value (`"string"`, `"int"`, ...).
    pub source_type: &'static str,
    /// Name of the requested Rust type.
    pub target_type: &'static str,
}

/// One element that failed inside a parallel stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementFailure {
    /// Position of the element in the materialized stage input.
    pub index: usize,
    /// Rendered error or panic payload.
    pub message: String,
}

/// All failures observed while fanning a stage out across workers.
///
/// A parallel stage is all-or-nothing: when this error is returned none of the
/// stage's partial output escapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateFailure {
    /// Stage that failed (`"parallel_map"`, `"parallel_for_each"`, ...).
    pub stage: &'static str,
    /// Number of elements the stage was given.
    pub total: usize,
    /// Failures ordered by element index. Never empty.
    pub failures: Vec<ElementFailure>,
}

impl AggregateFailure {
    /// The failure with the lowest element index.
    pub fn first(&self) -> Option<&ElementFailure> {
        self.failures.first()
    }

    /// Number of failed elements.
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} of {} element(s) failed",
            self.stage,
            self.failures.len(),
            self.total
        )?;
        if let Some(first) = self.first() {
            write!(f, "; first at #{}: {}", first.index, first.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateFailure {}
