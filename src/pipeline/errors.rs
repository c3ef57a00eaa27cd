//! Error types for pipeline domain

use crate::dependency::DependencyError;
use thiserror::Error;

/// Errors that can occur during pipeline operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Validation failed with specified reason
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// No pipeline matched the requested name
    #[error("Pipeline '{0}' not found")]
    NotFound(String),

    /// Pipeline dependencies are inconsistent
    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

/// Validation errors for pipeline components
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Name cannot be empty
    #[error("Name cannot be empty")]
    EmptyName,

    /// Name too long
    #[error("Name too long: max {max} characters, got {len}")]
    NameTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length of the name.
        len: usize,
    },

    /// Two siblings share the same name
    #[error("Duplicate {kind} name: '{name}'")]
    DuplicateName {
        /// What kind of item is duplicated (job, step, ...).
        kind: &'static str,
        /// The duplicated name.
        name: String,
    },

    /// Pipeline must have at least one job
    #[error("Pipeline '{pipeline}' must have at least one job")]
    EmptyPipeline {
        /// Name of the empty pipeline.
        pipeline: String,
    },

    /// Job must have at least one step
    #[error("Job '{job}' must have at least one step")]
    EmptyJob {
        /// Name of the empty job.
        job: String,
    },
}
