//! locally - run your local development environment
//!
//! Orchestrates docker services, terraform stacks, Key Vault secrets and
//! task pipelines declared in a context file.
//!
//! ## Quick Start
//!
//! ```bash
//! # Register and select a context
//! locally config set-context ./dev.yml
//!
//! # Run every pipeline of the context
//! locally pipelines run
//!
//! # Bring a stack and its dependencies up
//! locally infrastructure up network --build-dependencies
//!
//! # Start a service
//! locally docker up web
//! ```

use std::process::ExitCode;

mod cli;

fn main() -> ExitCode {
    match cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            tracing::debug!(error = ?e, "Command failed");
            ExitCode::FAILURE
        }
    }
}
