//! Task definitions
//!
//! A task is the atomic unit of work in a pipeline. Its `kind` selects the
//! worker that executes it and its `inputs` are an untyped mapping that the
//! worker decodes into its own parameter record.

#![allow(clippy::must_use_candidate, clippy::return_self_not_must_use)]

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Discriminant selecting which worker handles a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskKind {
    /// Run a command in a child process
    Bash,
    /// Issue one HTTP request
    Curl,
    /// Execute one SQL statement
    Sql,
    /// Clone a git repository
    Git,
    /// Build, run or compose containers
    Docker,
    /// Terraform stack operation
    Terraform,
    /// Pull secrets from Azure Key Vault into the resolver
    KeyvaultSync,
    /// Run the dotnet CLI
    Dotnet,
    /// Apply Entity Framework migrations
    EfMigrations,
    /// Run npm
    Npm,
    /// Write a web client environment manifest
    WebClientManifest,
    /// Publish release notes
    WhatsNew,
    /// A kind no built-in worker knows about
    Other(String),
}

impl TaskKind {
    /// Every built-in kind, in registry order
    pub const BUILTIN: [TaskKind; 12] = [
        TaskKind::Bash,
        TaskKind::Curl,
        TaskKind::Sql,
        TaskKind::Git,
        TaskKind::Docker,
        TaskKind::Terraform,
        TaskKind::KeyvaultSync,
        TaskKind::Dotnet,
        TaskKind::EfMigrations,
        TaskKind::Npm,
        TaskKind::WebClientManifest,
        TaskKind::WhatsNew,
    ];

    /// On-wire token for this kind
    pub fn as_str(&self) -> &str {
        match self {
            Self::Bash => "bash",
            Self::Curl => "curl",
            Self::Sql => "sql",
            Self::Git => "git",
            Self::Docker => "docker",
            Self::Terraform => "infrastructure",
            Self::KeyvaultSync => "keyvault-sync",
            Self::Dotnet => "dotnet",
            Self::EfMigrations => "ef-migrations",
            Self::Npm => "npm",
            Self::WebClientManifest => "webclient-manifest",
            Self::WhatsNew => "whats-new",
            Self::Other(token) => token,
        }
    }
}

impl From<&str> for TaskKind {
    fn from(token: &str) -> Self {
        match token.trim().to_lowercase().as_str() {
            "bash" => Self::Bash,
            "curl" => Self::Curl,
            "sql" => Self::Sql,
            "git" => Self::Git,
            "docker" => Self::Docker,
            "infrastructure" | "terraform" => Self::Terraform,
            "keyvault-sync" => Self::KeyvaultSync,
            "dotnet" => Self::Dotnet,
            "ef-migrations" => Self::EfMigrations,
            "npm" => Self::Npm,
            "webclient-manifest" => Self::WebClientManifest,
            "whats-new" => Self::WhatsNew,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for TaskKind {
    fn from(token: String) -> Self {
        Self::from(token.as_str())
    }
}

impl From<TaskKind> for String {
    fn from(kind: TaskKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single step of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Step name
    #[serde(default)]
    pub name: String,

    /// Kind of task
    #[serde(alias = "type")]
    pub kind: TaskKind,

    /// Untyped inputs decoded by the worker
    #[serde(default)]
    pub inputs: Map<String, Value>,

    /// Skip this step
    #[serde(default)]
    pub disabled: bool,

    /// Retries after the first failed attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,

    /// Seconds to wait between attempts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<u64>,
}

impl Task {
    /// Creates a new task with no inputs
    pub fn new(name: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            name: name.into(),
            kind,
            inputs: Map::new(),
            disabled: false,
            retry_count: None,
            wait_for: None,
        }
    }

    /// Adds an input value
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    /// Replaces all inputs
    pub fn with_inputs(mut self, inputs: Map<String, Value>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Sets the retry policy
    pub fn with_retry(mut self, retry_count: u32, wait_for: u64) -> Self {
        self.retry_count = Some(retry_count);
        self.wait_for = Some(wait_for);
        self
    }

    /// Marks the task disabled
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Effective retry count; the task level value wins over `inputs.retryCount`
    pub fn effective_retry_count(&self) -> u32 {
        self.retry_count
            .or_else(|| self.input_u64("retryCount").and_then(|v| u32::try_from(v).ok()))
            .unwrap_or(0)
    }

    /// Effective wait between attempts; the task level value wins over `inputs.waitFor`
    pub fn effective_wait(&self) -> Duration {
        Duration::from_secs(
            self.wait_for
                .or_else(|| self.input_u64("waitFor"))
                .unwrap_or(0),
        )
    }

    /// Display name, falling back to the kind
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.kind.as_str()
        } else {
            &self.name
        }
    }

    fn input_u64(&self, key: &str) -> Option<u64> {
        match self.inputs.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.display_name())
    }
}
