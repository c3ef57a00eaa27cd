//! Core types for pipeline domain
//!
//! This module contains the uniform result every worker hands back,
//! whatever kind of task it executed.

#![allow(clippy::must_use_candidate)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes carried by [`WorkerResult::error_code`].
pub mod codes {
    /// The task was not claimed by the worker.
    pub const IGNORED: &str = "100";
    /// Task inputs failed to decode or validate.
    pub const INVALID_PARAMETERS: &str = "400";
    /// A named artefact (stack, service, pipeline) does not exist.
    pub const NOT_FOUND: &str = "404";
    /// A lifecycle prerequisite was not met.
    pub const MISSING_PREREQUISITE: &str = "412";
    /// The external process or client reported a failure.
    pub const EXECUTION_FAILED: &str = "500";
    /// Transport level failure (HTTP, SQL, SDK).
    pub const CONNECTION_FAILED: &str = "503";
}

/// Terminal state of a worker invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultState {
    /// The worker does not handle this task kind
    Ignored,
    /// Validation passed (validation entry point only)
    Valid,
    /// The task ran to completion
    Executed,
    /// The task failed
    Errored,
}

impl ResultState {
    /// Returns true if the task ran successfully
    #[must_use]
    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed)
    }

    /// Returns true if the task failed
    #[must_use]
    pub fn is_errored(&self) -> bool {
        matches!(self, Self::Errored)
    }

    /// Returns true if the worker did not claim the task
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored)
    }

    /// Returns true if validation passed
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for ResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignored => write!(f, "IGNORED"),
            Self::Valid => write!(f, "VALID"),
            Self::Executed => write!(f, "EXECUTED"),
            Self::Errored => write!(f, "ERRORED"),
        }
    }
}

/// Uniform outcome of running or validating a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResult {
    /// Terminal state
    pub state: ResultState,
    /// Error code, empty unless errored or ignored
    #[serde(default)]
    pub error_code: String,
    /// Error detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Kind specific status (HTTP status, exit code)
    #[serde(default)]
    pub status_code: String,
    /// Captured output
    #[serde(default)]
    pub output: String,
    /// Number of invocations made by the retry harness
    #[serde(default)]
    pub attempts: u32,
    /// Wall clock time of the last invocation
    #[serde(default)]
    pub duration_ms: u64,
}

impl WorkerResult {
    fn with_state(state: ResultState) -> Self {
        Self {
            state,
            error_code: String::new(),
            error: None,
            status_code: String::new(),
            output: String::new(),
            attempts: 0,
            duration_ms: 0,
        }
    }

    /// Task not claimed
    pub fn ignored() -> Self {
        let mut result = Self::with_state(ResultState::Ignored);
        result.error_code = codes::IGNORED.to_string();
        result
    }

    /// Validation passed
    pub fn valid() -> Self {
        Self::with_state(ResultState::Valid)
    }

    /// Task executed with the given output
    pub fn executed(output: impl Into<String>) -> Self {
        let mut result = Self::with_state(ResultState::Executed);
        result.output = output.into();
        result
    }

    /// Task failed with a code and message
    pub fn errored(code: impl Into<String>, error: impl Into<String>) -> Self {
        let mut result = Self::with_state(ResultState::Errored);
        result.error_code = code.into();
        result.error = Some(error.into());
        result
    }

    /// Sets the status code
    #[must_use]
    pub fn with_status_code(mut self, status: impl Into<String>) -> Self {
        self.status_code = status.into();
        self
    }

    /// Sets the output
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Error message or an empty string
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("")
    }
}

impl fmt::Display for WorkerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            ResultState::Errored => write!(
                f,
                "{} [{}] {}",
                self.state,
                self.error_code,
                self.error_message()
            ),
            _ => write!(f, "{}", self.state),
        }
    }
}

/// Trait for types that can be validated
#[allow(clippy::missing_errors_doc)]
pub trait Validate {
    /// Type of validation error
    type Error;

    /// Validates this type
    fn validate(&self) -> std::result::Result<(), Self::Error>;
}
