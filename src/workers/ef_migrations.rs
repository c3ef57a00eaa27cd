//! Entity Framework migrations worker

use crate::executor::{TaskWorker, WorkerContext};
use crate::pipeline::{Task, TaskKind, WorkerResult};
use crate::tasks::{EfMigrationsParameters, redact_url};
use crate::workers::{run_tool, tool_command};

/// Runs `dotnet ef`
#[derive(Debug, Clone, Copy, Default)]
pub struct EfMigrationsWorker;

impl TaskWorker for EfMigrationsWorker {
    type Params = EfMigrationsParameters;

    fn kind(&self) -> TaskKind {
        TaskKind::EfMigrations
    }

    fn execute(&self, params: &EfMigrationsParameters, task: &Task, ctx: &WorkerContext) -> WorkerResult {
        let command = tool_command(
            ctx,
            &ctx.options.tools.dotnet,
            params.to_args(),
            params.working_directory.as_deref(),
        );
        tracing::debug!(
            task = %task,
            command = ?params.command,
            connection = %params.connection_string.as_deref().map(redact_url).unwrap_or_default(),
            "Running dotnet ef"
        );
        run_tool(command, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{RunOptions, Tools, Worker};
    use crate::pipeline::codes;
    use crate::workers::testing;
    use pretty_assertions::assert_eq;

    fn ctx() -> WorkerContext {
        testing::context().with_options(RunOptions {
            tools: Tools {
                dotnet: "echo".to_string(),
                ..Tools::default()
            },
            ..RunOptions::default()
        })
    }

    #[test]
    fn test_database_update() {
        let task = Task::new("migrate", TaskKind::EfMigrations).with_inputs(crate::inputs! {
            "command" => "update",
            "projectPath" => "src/Data",
            "connectionString" => "Host=localhost;Database=app",
        });
        let result = EfMigrationsWorker.run(&task, &ctx());
        assert_eq!(
            result.output.trim(),
            "ef database update --project src/Data --connection Host=localhost;Database=app"
        );
    }

    #[test]
    fn test_add_requires_name() {
        let task = Task::new("add", TaskKind::EfMigrations).with_input("command", "add");
        let result = EfMigrationsWorker.run(&task, &ctx());
        assert_eq!(result.error_code, codes::INVALID_PARAMETERS);
    }
}
