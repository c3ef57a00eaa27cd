//! Task execution layer
//!
//! Worker traits, the worker registry, the retry harness and the external
//! process runner.

pub mod process;
pub mod registry;
pub mod retry;
pub mod traits;

pub use process::{ProcessCommand, ProcessError, ProcessResult};
pub use registry::{ValidationReport, WorkerRegistry};
pub use retry::retry_run;
pub use traits::{RunOptions, TaskWorker, Tools, Worker, WorkerContext};
