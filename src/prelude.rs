//! Prelude module for common imports

// Re-export macros
pub use crate::{inputs, task};

// Domain types
pub use crate::pipeline::errors::{PipelineError, ValidationError};
pub use crate::pipeline::pipeline_def::{Job, Pipeline};
pub use crate::pipeline::task::{Task, TaskKind};
pub use crate::pipeline::types::{ResultState, Validate, WorkerResult, codes};

// Execution
pub use crate::executor::{RunOptions, TaskWorker, Worker, WorkerContext, WorkerRegistry};
pub use crate::runner::{PipelineStatus, RunSummary, Runner};

// Variables and output
pub use crate::diagnostics::Diagnostics;
pub use crate::notify::Notifier;
pub use crate::vault::{MemoryVault, Vault, VariableResolver};
