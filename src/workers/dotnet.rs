//! Dotnet worker

use crate::executor::{TaskWorker, WorkerContext};
use crate::pipeline::{Task, TaskKind, WorkerResult};
use crate::tasks::DotnetParameters;
use crate::workers::{run_tool, tool_command};

/// Runs the dotnet CLI
#[derive(Debug, Clone, Copy, Default)]
pub struct DotnetWorker;

impl TaskWorker for DotnetWorker {
    type Params = DotnetParameters;

    fn kind(&self) -> TaskKind {
        TaskKind::Dotnet
    }

    fn execute(&self, params: &DotnetParameters, task: &Task, ctx: &WorkerContext) -> WorkerResult {
        let command = tool_command(
            ctx,
            &ctx.options.tools.dotnet,
            params.to_args(),
            params.working_directory.as_deref(),
        );
        tracing::debug!(task = %task, command = %command.display(), "Running dotnet");
        run_tool(command, ctx)
    }
}
