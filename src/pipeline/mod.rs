//! Pipeline domain types and logic

pub mod errors;
pub mod pipeline_def;
pub mod task;
pub mod types;

#[cfg(test)]
mod types_tests;

pub use errors::{PipelineError, ValidationError};
pub use pipeline_def::{Job, Pipeline};
pub use task::{Task, TaskKind};
pub use types::{ResultState, Validate, WorkerResult, codes};
