//! `locally infrastructure` - Terraform stack lifecycle

use anyhow::Result;
use clap::ValueEnum;
use locally::pipeline::{Task, TaskKind};
use locally::tasks::TerraformCommand;
use std::process::ExitCode;

use super::app::App;

/// Stack operations
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum InfrastructureAction {
    /// `terraform init`
    Init,
    /// `terraform validate`
    Validate,
    /// `terraform plan`
    Plan,
    /// Apply the saved plan
    Apply,
    /// `terraform destroy`
    Destroy,
    /// `terraform graph`
    Graph,
    /// Read outputs into the `infrastructure` vault
    Output,
    /// Init, plan and apply
    Up,
    /// Destroy
    Down,
    /// `terraform refresh`
    Refresh,
}

impl InfrastructureAction {
    /// Terraform commands the action expands to, in order
    #[must_use]
    pub fn commands(self) -> Vec<TerraformCommand> {
        match self {
            Self::Init => vec![TerraformCommand::Init],
            Self::Validate => vec![TerraformCommand::Validate],
            Self::Plan => vec![TerraformCommand::Plan],
            Self::Apply => vec![TerraformCommand::Apply],
            Self::Destroy | Self::Down => vec![TerraformCommand::Destroy],
            Self::Graph => vec![TerraformCommand::Graph],
            Self::Output => vec![TerraformCommand::Output],
            Self::Refresh => vec![TerraformCommand::Refresh],
            Self::Up => vec![
                TerraformCommand::Init,
                TerraformCommand::Plan,
                TerraformCommand::Apply,
            ],
        }
    }
}

/// Builds the task running `command` on `stack`
#[must_use]
pub fn stack_task(command: TerraformCommand, stack: &str, build_dependencies: bool) -> Task {
    Task::new(format!("{stack}-{command}"), TaskKind::Terraform).with_inputs(locally::inputs! {
        "command" => command.as_str(),
        "stackName" => stack,
        "buildDependencies" => build_dependencies,
    })
}

/// Executes an `infrastructure` subcommand
pub fn run(
    app: &App,
    action: InfrastructureAction,
    stack: &str,
    build_dependencies: bool,
) -> Result<ExitCode> {
    let ctx = app.worker_context(Some(app.context()?))?;
    for command in action.commands() {
        let task = stack_task(command, stack, build_dependencies);
        if !app.run_task(&task, &ctx) {
            return Ok(ExitCode::FAILURE);
        }
    }
    Ok(ExitCode::SUCCESS)
}
