//! Npm worker

use crate::executor::{TaskWorker, WorkerContext};
use crate::pipeline::{Task, TaskKind, WorkerResult};
use crate::tasks::NpmParameters;
use crate::workers::{run_tool, tool_command};

/// Runs npm
#[derive(Debug, Clone, Copy, Default)]
pub struct NpmWorker;

impl TaskWorker for NpmWorker {
    type Params = NpmParameters;

    fn kind(&self) -> TaskKind {
        TaskKind::Npm
    }

    fn execute(&self, params: &NpmParameters, task: &Task, ctx: &WorkerContext) -> WorkerResult {
        let command = tool_command(
            ctx,
            &ctx.options.tools.npm,
            params.to_args(),
            params.working_directory.as_deref(),
        );
        tracing::debug!(task = %task, command = %command.display(), "Running npm");
        run_tool(command, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{RunOptions, Tools, Worker};
    use crate::workers::testing;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_run_script_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = testing::context().with_options(RunOptions {
            tools: Tools {
                npm: "echo".to_string(),
                ..Tools::default()
            },
            ..RunOptions::default()
        });
        let task = Task::new("lint", TaskKind::Npm).with_inputs(crate::inputs! {
            "command" => "run",
            "script" => "lint",
            "workingDirectory" => dir.path().to_str().unwrap(),
        });
        let result = NpmWorker.run(&task, &ctx);
        assert_eq!(result.output.trim(), "run lint");
    }
}
