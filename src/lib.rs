//! # locally - a local development environment orchestrator
//!
//! locally reads a context file describing docker services, terraform stacks,
//! Key Vaults and pipelines, and runs them on the developer's machine.
//!
//! ## Quick Start
//!
//! ```rust
//! use locally::prelude::*;
//! use std::sync::Arc;
//!
//! let resolver = Arc::new(VariableResolver::new());
//! let notifier = Arc::new(Notifier::buffered());
//! let ctx = WorkerContext::new(resolver, notifier);
//! let registry = WorkerRegistry::with_builtin();
//!
//! let pipelines = vec![Pipeline::new("hello").with_job(Job::new(
//!     "greet",
//!     vec![Task::new("echo", TaskKind::Bash).with_input("command", "echo hello")],
//! ))];
//! let summary = Runner::new(&registry, &ctx).validate(&pipelines, None).unwrap();
//! assert!(!summary.has_errors());
//! ```
//!
//! ## Layout
//!
//! - [`pipeline`]: pipelines, jobs, tasks and worker results
//! - [`tasks`]: typed parameter records, one per task kind
//! - [`workers`]: the built-in workers
//! - [`executor`]: worker traits, registry, retry harness and child processes
//! - [`runner`]: pipeline traversal
//! - [`vault`]: vaults and the `${{ vault.key }}` resolver
//! - [`dependency`]: `dependsOn` ordering
//! - [`diagnostics`] and [`notify`]: structured issues and user-facing output
//! - [`infrastructure`]: configuration, logging, Azure and the admin API
//! - [`query`]: pagination requests to SQL

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod macros;

pub mod dependency;
pub mod diagnostics;
pub mod executor;
pub mod infrastructure;
pub mod notify;
pub mod pipeline;
pub mod query;
pub mod runner;
pub mod tasks;
pub mod vault;
pub mod workers;

// Prelude module for common imports
pub mod prelude;

// Re-export commonly used types
pub use dependency::{Dependable, DependencyError};
pub use diagnostics::Diagnostics;
pub use executor::{RunOptions, Worker, WorkerContext, WorkerRegistry, retry_run};
pub use infrastructure::{ConfigError, ContextConfig, GlobalConfig};
pub use notify::Notifier;
pub use pipeline::{
    Job, Pipeline, PipelineError, ResultState, Task, TaskKind, Validate, WorkerResult,
};
pub use runner::{RunSummary, Runner};
pub use vault::{ResolverError, VariableResolver};

/// Version of the locally crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
