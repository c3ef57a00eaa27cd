//! Worker traits and execution context
//!
//! A [`Worker`] executes the tasks of one kind. Most workers implement
//! [`TaskWorker`] instead, which supplies the shared lifecycle through a
//! blanket implementation: kind check, parameter decoding with placeholder
//! expansion, validation and execution under the retry harness.

use crate::executor::retry::retry_run;
use crate::infrastructure::{
    AzureKeyVaultFactory, ContextConfig, SecretProviderFactory, TokenCache,
};
use crate::notify::Notifier;
use crate::pipeline::{Task, TaskKind, WorkerResult, codes};
use crate::tasks::{TaskParameters, decode};
use crate::vault::VariableResolver;
use std::path::PathBuf;
use std::sync::Arc;

/// Executable names of the external tools workers call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    /// Terraform CLI
    pub terraform: String,
    /// Docker CLI
    pub docker: String,
    /// Git CLI
    pub git: String,
    /// Dotnet CLI
    pub dotnet: String,
    /// Npm CLI
    pub npm: String,
    /// Azure CLI
    pub az: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            terraform: "terraform".to_string(),
            docker: "docker".to_string(),
            git: "git".to_string(),
            dotnet: "dotnet".to_string(),
            npm: "npm".to_string(),
            az: "az".to_string(),
        }
    }
}

/// Options of a run, set from global CLI flags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Skip interactive approvals
    pub auto_approve: bool,
    /// Never prompt
    pub no_input: bool,
    /// Stream child output to the terminal
    pub stream_output: bool,
    /// External tools
    pub tools: Tools,
}

/// Everything a worker may use while executing a task
pub struct WorkerContext {
    /// Variable resolver
    pub resolver: Arc<VariableResolver>,
    /// User-facing notifications
    pub notifier: Arc<Notifier>,
    /// Current context file, if one is loaded
    pub context: Option<Arc<ContextConfig>>,
    /// ACR token cache
    pub tokens: Arc<TokenCache>,
    /// Key Vault access
    pub secrets: Arc<dyn SecretProviderFactory>,
    /// Run options
    pub options: RunOptions,
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("context", &self.context.as_ref().map(|c| c.name.clone()))
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl WorkerContext {
    /// Context without a context file, for ad-hoc runs and tests
    #[must_use]
    pub fn new(resolver: Arc<VariableResolver>, notifier: Arc<Notifier>) -> Self {
        Self {
            resolver,
            notifier,
            context: None,
            tokens: Arc::new(TokenCache::new()),
            secrets: Arc::new(AzureKeyVaultFactory),
            options: RunOptions::default(),
        }
    }

    /// Attaches a context file
    #[must_use]
    pub fn with_context(mut self, context: Arc<ContextConfig>) -> Self {
        self.context = Some(context);
        self
    }

    /// Replaces the Key Vault factory
    #[must_use]
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretProviderFactory>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Replaces the run options
    #[must_use]
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Base directory for relative paths
    #[must_use]
    pub fn workspace(&self) -> PathBuf {
        match &self.context {
            Some(context) => context.workspace_dir(),
            None => std::env::current_dir().unwrap_or_default(),
        }
    }

    /// Resolves `path` against the workspace
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        self.workspace().join(path)
    }
}

/// Executes the tasks of one kind
pub trait Worker: Send + Sync {
    /// Kind this worker claims
    fn kind(&self) -> TaskKind;

    /// Runs `task`, or returns `Ignored` when it is of another kind
    fn run(&self, task: &Task, ctx: &WorkerContext) -> WorkerResult;

    /// Checks `task` without executing it
    fn validate(&self, task: &Task, ctx: &WorkerContext) -> WorkerResult;
}

/// A worker with a typed parameter record
pub trait TaskWorker: Send + Sync {
    /// Parameter record
    type Params: TaskParameters;

    /// Kind this worker claims
    fn kind(&self) -> TaskKind;

    /// Performs one attempt with decoded parameters
    fn execute(&self, params: &Self::Params, task: &Task, ctx: &WorkerContext) -> WorkerResult;
}

impl<W: TaskWorker> Worker for W {
    fn kind(&self) -> TaskKind {
        TaskWorker::kind(self)
    }

    fn run(&self, task: &Task, ctx: &WorkerContext) -> WorkerResult {
        if task.kind != TaskWorker::kind(self) {
            return WorkerResult::ignored();
        }

        let params = match decode::<W::Params>(task, &ctx.resolver) {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(task = %task, error = %e, "Task parameters rejected");
                return WorkerResult::errored(codes::INVALID_PARAMETERS, e.to_string());
            }
        };

        retry_run(
            Some(|attempt: u32| {
                tracing::debug!(task = %task, attempt, "Executing task");
                self.execute(&params, task, ctx)
            }),
            task.effective_retry_count(),
            task.effective_wait(),
        )
    }

    fn validate(&self, task: &Task, ctx: &WorkerContext) -> WorkerResult {
        if task.kind != TaskWorker::kind(self) {
            return WorkerResult::ignored();
        }
        match decode::<W::Params>(task, &ctx.resolver) {
            Ok(_) => WorkerResult::valid(),
            Err(e) => WorkerResult::errored(codes::INVALID_PARAMETERS, e.to_string()),
        }
    }
}
