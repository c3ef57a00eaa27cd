//! Bash worker

use crate::executor::{ProcessCommand, TaskWorker, WorkerContext};
use crate::pipeline::{Task, TaskKind, WorkerResult};
use crate::tasks::BashParameters;
use crate::workers::run_tool;

/// Runs a command in a child process
#[derive(Debug, Clone, Copy, Default)]
pub struct BashWorker;

impl TaskWorker for BashWorker {
    type Params = BashParameters;

    fn kind(&self) -> TaskKind {
        TaskKind::Bash
    }

    fn execute(&self, params: &BashParameters, task: &Task, ctx: &WorkerContext) -> WorkerResult {
        let mut command = ProcessCommand::new(&params.command)
            .args(&params.arguments)
            .envs(&params.environment);
        if let Some(dir) = params.working_directory.as_deref().filter(|d| !d.is_empty()) {
            command = command.current_dir(ctx.resolve_path(dir));
        }
        tracing::debug!(task = %task, command = %command.display(), "Running command");
        run_tool(command, ctx)
    }
}
