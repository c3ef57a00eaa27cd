//! `locally docker` - Service containers

use anyhow::Result;
use clap::ValueEnum;
use locally::pipeline::{Task, TaskKind};
use locally::tasks::DockerCommand;
use std::process::ExitCode;

use super::app::App;

/// Docker operations
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DockerAction {
    /// Build images
    Build,
    /// Rebuild images without cache and recreate containers
    Rebuild,
    /// Run containers
    Run,
    /// `docker compose up` for the service
    Up,
    /// `docker compose down` for the service
    Down,
    /// Start stopped containers
    Start,
    /// Stop containers
    Stop,
    /// Pause containers
    Pause,
    /// Unpause containers
    Resume,
    /// Show container state
    Status,
    /// List services and components
    List,
    /// Show recent container logs
    Logs,
    /// Remove containers
    Delete,
    /// Pull images
    Pull,
    /// Write a compose file for the service
    #[value(alias = "generate")]
    GenerateCompose,
}

impl From<DockerAction> for DockerCommand {
    fn from(action: DockerAction) -> Self {
        match action {
            DockerAction::Build => Self::Build,
            DockerAction::Rebuild => Self::Rebuild,
            DockerAction::Run => Self::Run,
            DockerAction::Up => Self::Up,
            DockerAction::Down => Self::Down,
            DockerAction::Start => Self::Start,
            DockerAction::Stop => Self::Stop,
            DockerAction::Pause => Self::Pause,
            DockerAction::Resume => Self::Resume,
            DockerAction::Status => Self::Status,
            DockerAction::List => Self::List,
            DockerAction::Logs => Self::Logs,
            DockerAction::Delete => Self::Delete,
            DockerAction::Pull => Self::Pull,
            DockerAction::GenerateCompose => Self::GenerateCompose,
        }
    }
}

/// Builds the docker task for one invocation
#[must_use]
pub fn docker_task(
    command: DockerCommand,
    service: Option<&str>,
    component: Option<&str>,
    build_dependencies: bool,
) -> Task {
    let name = match (service, component) {
        (Some(service), Some(component)) => format!("{service}-{component}-{command}"),
        (Some(service), None) => format!("{service}-{command}"),
        _ => command.to_string(),
    };
    let mut task = Task::new(name, TaskKind::Docker).with_inputs(locally::inputs! {
        "command" => command.to_string(),
        "buildDependencies" => build_dependencies,
    });
    if let Some(service) = service {
        task = task.with_input("service", service);
    }
    if let Some(component) = component {
        task = task.with_input("component", component);
    }
    task
}

/// Executes a `docker` subcommand
pub fn run(
    app: &App,
    action: DockerAction,
    service: Option<&str>,
    component: Option<&str>,
    build_dependencies: bool,
) -> Result<ExitCode> {
    let command = DockerCommand::from(action);
    if command.needs_service() && service.is_none() {
        anyhow::bail!("`docker {command}` needs a service name");
    }
    let ctx = app.worker_context(Some(app.context()?))?;
    let task = docker_task(command, service, component, build_dependencies);
    Ok(if app.run_task(&task, &ctx) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use locally::tasks::{DockerParameters, decode};
    use locally::vault::VariableResolver;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_docker_task_decodes() {
        let task = docker_task(
            DockerAction::GenerateCompose.into(),
            Some("web"),
            Some("ui"),
            true,
        );
        assert_eq!(task.to_string(), "docker(web-ui-generate-compose)");
        let params: DockerParameters = decode(&task, &VariableResolver::new()).unwrap();
        assert_eq!(params.command, DockerCommand::GenerateCompose);
        assert_eq!(params.service.as_deref(), Some("web"));
        assert_eq!(params.component.as_deref(), Some("ui"));
        assert!(params.build_dependencies);
    }

    #[test]
    fn test_list_needs_no_service() {
        let task = docker_task(DockerCommand::List, None, None, false);
        let params: DockerParameters = decode(&task, &VariableResolver::new()).unwrap();
        assert_eq!(params.command, DockerCommand::List);
        assert_eq!(params.service, None);
    }
}
