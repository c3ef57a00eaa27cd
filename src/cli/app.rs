//! Composition root
//!
//! Builds the values every command shares: the locally home, the global
//! configuration, the notifier, and on demand the current context, the
//! variable resolver and the worker registry.

use anyhow::{Context, Result};
use locally::executor::{RunOptions, WorkerContext, WorkerRegistry};
use locally::infrastructure::{
    ContextConfig, DEFAULT_LEVEL, GlobalConfig, init_logging, level_for, locally_home,
};
use locally::notify::Notifier;
use locally::pipeline::{Task, WorkerResult};
use locally::vault::{ConfigVault, EnvironmentVault, VariableResolver};
use std::path::PathBuf;
use std::sync::Arc;

use super::GlobalFlags;

/// Shared state of one CLI invocation
#[derive(Debug)]
pub struct App {
    /// Global flags
    pub flags: GlobalFlags,
    /// Locally home directory
    pub home: PathBuf,
    /// Contents of `config.yml`
    pub global: GlobalConfig,
    /// User-facing output
    pub notifier: Arc<Notifier>,
}

impl App {
    /// Resolves the home directory, reads `config.yml` and installs logging
    pub fn new(flags: GlobalFlags) -> Result<Self> {
        let home = locally_home().context("Cannot locate the locally home directory")?;
        let global = GlobalConfig::load(&home).context("Cannot read the global configuration")?;

        let level = if flags.debug || flags.verbose {
            level_for(flags.debug, flags.verbose).to_string()
        } else {
            global
                .log_level
                .clone()
                .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
        };
        init_logging(&level);
        tracing::debug!(home = %home.display(), level = %level, "Starting locally");

        Ok(Self {
            flags,
            home,
            global,
            notifier: Arc::new(Notifier::console(flags.debug || flags.verbose)),
        })
    }

    /// Run options derived from the global flags
    #[must_use]
    pub fn options(&self) -> RunOptions {
        RunOptions {
            auto_approve: self.flags.auto_approve,
            no_input: self.flags.no_input,
            stream_output: true,
            ..RunOptions::default()
        }
    }

    /// Loads the current context file
    pub fn context(&self) -> Result<Arc<ContextConfig>> {
        let context = self
            .global
            .load_current()
            .context("Cannot load the current context")?;
        tracing::debug!(context = %context.name, "Context loaded");
        Ok(Arc::new(context))
    }

    /// Builds the worker context, with the `env` and `config` vaults registered
    pub fn worker_context(&self, context: Option<Arc<ContextConfig>>) -> Result<WorkerContext> {
        let resolver = Arc::new(VariableResolver::new());
        resolver
            .register(EnvironmentVault)
            .context("Cannot read the process environment")?;
        if let Some(context) = &context {
            resolver
                .register(ConfigVault::new(context.variables.clone()))
                .context("Cannot load the context variables")?;
        }

        let ctx = WorkerContext::new(resolver, Arc::clone(&self.notifier)).with_options(self.options());
        Ok(match context {
            Some(context) => ctx.with_context(context),
            None => ctx,
        })
    }

    /// Runs one task through the built-in workers; `false` when it errored
    pub fn run_task(&self, task: &Task, ctx: &WorkerContext) -> bool {
        let registry = WorkerRegistry::with_builtin();
        let result = registry.run(task, ctx);
        self.report(task, &result)
    }

    /// Prints the outcome of a task; `false` when it errored
    pub fn report(&self, task: &Task, result: &WorkerResult) -> bool {
        if result.state.is_errored() {
            self.notifier.error(format!("{task} failed: {result}"));
            return false;
        }
        if result.state.is_ignored() {
            self.notifier.warning(format!("No worker handled {task}"));
        }
        tracing::debug!(task = %task, state = %result.state, duration_ms = result.duration_ms, "Task finished");
        true
    }
}
