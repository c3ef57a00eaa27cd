//! Docker worker
//!
//! Builds, runs and composes the components of a service declared in the
//! context file. Component commands are issued in dependency order (reverse
//! order for teardown) and every failing component is recorded; the task
//! fails when any was.

pub mod compose;

pub use compose::{COMPOSE_FILE, ComposeFile};

use crate::dependency;
use crate::diagnostics::Diagnostics;
use crate::executor::{ProcessCommand, TaskWorker, WorkerContext};
use crate::infrastructure::{Component, Service, acr_login};
use crate::pipeline::{Task, TaskKind, WorkerResult, codes};
use crate::tasks::{DockerCommand, DockerParameters, RegistryCredentials};
use crate::workers::process_failure;
use std::path::PathBuf;

/// Drives the docker CLI for context services
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerWorker;

impl TaskWorker for DockerWorker {
    type Params = DockerParameters;

    fn kind(&self) -> TaskKind {
        TaskKind::Docker
    }

    fn execute(&self, params: &DockerParameters, task: &Task, ctx: &WorkerContext) -> WorkerResult {
        let Some(context) = &ctx.context else {
            return WorkerResult::errored(codes::NOT_FOUND, "no context is loaded");
        };

        if params.command == DockerCommand::List {
            return WorkerResult::executed(list(&context.services, params.service.as_deref()));
        }
        if params.command == DockerCommand::Status && params.service.is_none() {
            return status(ctx, None);
        }

        let name = params.service.as_deref().unwrap_or_default();
        let Some(service) = context.service(name) else {
            return WorkerResult::errored(codes::NOT_FOUND, format!("service '{name}' not found"));
        };
        let components = match select(service, params) {
            Ok(components) => components,
            Err(result) => return result,
        };

        let docker = Docker {
            ctx,
            service,
            dir: context.workspace_dir().join(service.path.as_deref().unwrap_or(&service.name)),
        };
        tracing::info!(task = %task, service = %service.name, command = %params.command, "Docker");

        let credentials = params.credentials.as_ref().or(service.registry.as_ref());
        if needs_registry(params.command) {
            if let Some(credentials) = credentials {
                if let Err(result) = docker.login(credentials) {
                    return result;
                }
            }
        }

        match params.command {
            DockerCommand::GenerateCompose => docker.generate_compose().map_or_else(
                |result| result,
                |path| WorkerResult::executed(path.display().to_string()),
            ),
            DockerCommand::Up => docker.compose(&["up", "-d", "--remove-orphans"]),
            DockerCommand::Down => docker.compose(&["down"]),
            DockerCommand::Status => status(ctx, Some(&service.name)),
            command => docker.each(command, &components),
        }
    }
}

fn needs_registry(command: DockerCommand) -> bool {
    matches!(
        command,
        DockerCommand::Build
            | DockerCommand::Rebuild
            | DockerCommand::Pull
            | DockerCommand::Run
            | DockerCommand::Up
    )
}

/// Components addressed by the task, in execution order
fn select(service: &Service, params: &DockerParameters) -> Result<Vec<Component>, WorkerResult> {
    let mut components = match params.component.as_deref().filter(|c| !c.is_empty()) {
        None => service.components.clone(),
        Some(name) if params.build_dependencies => {
            dependency::closure(service.components.clone(), name)
                .map_err(|e| WorkerResult::errored(codes::NOT_FOUND, e.to_string()))?
        }
        Some(name) => match service.component(name) {
            Some(component) => vec![component.clone()],
            None => {
                return Err(WorkerResult::errored(
                    codes::NOT_FOUND,
                    format!("component '{name}' not found in service '{}'", service.name),
                ));
            }
        },
    };
    if matches!(
        params.command,
        DockerCommand::Stop | DockerCommand::Delete | DockerCommand::Pause
    ) {
        components.reverse();
    }
    Ok(components)
}

fn list(services: &[Service], only: Option<&str>) -> String {
    services
        .iter()
        .filter(|s| only.is_none_or(|name| s.name == name))
        .flat_map(|s| {
            s.components
                .iter()
                .map(move |c| format!("{}/{} {}", s.name, c.name, compose::image_of(s, c)))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

struct Docker<'a> {
    ctx: &'a WorkerContext,
    service: &'a Service,
    dir: PathBuf,
}

/// Containers of one service, or of every service
fn status(ctx: &WorkerContext, service: Option<&str>) -> WorkerResult {
    let filter = match service {
        Some(name) => format!("label={}={name}", compose::SERVICE_LABEL),
        None => format!("label={}", compose::SERVICE_LABEL),
    };
    let result = ProcessCommand::new(&ctx.options.tools.docker)
        .args(["ps", "-a", "--filter", filter.as_str()])
        .args(["--format", "{{.Names}}\t{{.Status}}"])
        .run();
    match result {
        Ok(output) => WorkerResult::executed(output.stdout),
        Err(e) => process_failure(&e),
    }
}

impl Docker<'_> {
    fn docker(&self) -> ProcessCommand {
        ProcessCommand::new(&self.ctx.options.tools.docker)
    }

    fn login(&self, credentials: &RegistryCredentials) -> Result<(), WorkerResult> {
        let (server, username, password) = if let Some(acr) = credentials.acr.as_deref() {
            let acr = acr_login(acr, &self.ctx.tokens, &self.ctx.options.tools.az)
                .map_err(|e| WorkerResult::errored(codes::EXECUTION_FAILED, e.to_string()))?;
            (acr.login_server, acr.username, acr.token)
        } else {
            match (&credentials.registry, &credentials.username, &credentials.password) {
                (Some(registry), Some(username), Some(password)) => {
                    (registry.clone(), username.clone(), password.clone())
                }
                _ => {
                    tracing::debug!(service = %self.service.name, "Incomplete registry credentials, skipping login");
                    return Ok(());
                }
            }
        };

        tracing::debug!(server = %server, username = %username, "Registry login");
        self.docker()
            .args(["login", server.as_str(), "--username", username.as_str(), "--password-stdin"])
            .stdin(password)
            .run()
            .map(|_| ())
            .map_err(|e| process_failure(&e))
    }

    fn generate_compose(&self) -> Result<PathBuf, WorkerResult> {
        let yaml = ComposeFile::for_service(self.service)
            .to_yaml()
            .map_err(|e| WorkerResult::errored(codes::EXECUTION_FAILED, e.to_string()))?;
        let path = self.dir.join(COMPOSE_FILE);
        std::fs::create_dir_all(&self.dir)
            .and_then(|()| std::fs::write(&path, yaml))
            .map_err(|e| {
                WorkerResult::errored(
                    codes::EXECUTION_FAILED,
                    format!("cannot write {}: {e}", path.display()),
                )
            })?;
        self.ctx
            .notifier
            .success(format!("Compose file written to {}", path.display()));
        Ok(path)
    }

    fn compose(&self, args: &[&str]) -> WorkerResult {
        let path = match self.generate_compose() {
            Ok(path) => path,
            Err(result) => return result,
        };
        let result = self
            .docker()
            .args(["compose", "-f"])
            .arg(path.display().to_string())
            .args(["-p", self.service.name.as_str()])
            .args(args.iter().copied())
            .current_dir(&self.dir)
            .streaming(self.ctx.options.stream_output)
            .run();
        match result {
            Ok(output) => WorkerResult::executed(output.stdout).with_status_code("0"),
            Err(e) => process_failure(&e),
        }
    }

    fn each(&self, command: DockerCommand, components: &[Component]) -> WorkerResult {
        let mut diagnostics = Diagnostics::new(format!("docker {command} {}", self.service.name));
        let mut outputs = Vec::new();

        for component in components {
            let name = compose::container_name(self.service, component);
            let failure = self.steps(command, component).into_iter().find_map(|step| {
                match step.streaming(self.ctx.options.stream_output).run() {
                    Ok(output) => {
                        outputs.push(output.stdout);
                        None
                    }
                    Err(e) => Some(e),
                }
            });
            match failure {
                Some(e) => diagnostics.add_error(
                    codes::EXECUTION_FAILED,
                    e.to_string(),
                    "docker",
                    [("container", name.as_str())],
                ),
                None => tracing::debug!(container = %name, command = %command, "Component done"),
            }
        }
        diagnostics.complete();

        if diagnostics.has_errors() {
            for issue in diagnostics.errors() {
                self.ctx.notifier.error(issue);
            }
            let message = diagnostics
                .errors()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return WorkerResult::errored(codes::EXECUTION_FAILED, message);
        }
        self.ctx.notifier.success(format!(
            "{command} {} ({} components)",
            self.service.name,
            components.len()
        ));
        WorkerResult::executed(outputs.join("")).with_status_code("0")
    }

    /// Docker invocations of one command for one component
    fn steps(&self, command: DockerCommand, component: &Component) -> Vec<ProcessCommand> {
        let name = compose::container_name(self.service, component);
        match command {
            DockerCommand::Build => self.build(component, false).into_iter().collect(),
            DockerCommand::Rebuild => {
                let mut steps: Vec<_> = self.build(component, true).into_iter().collect();
                steps.push(self.docker().args(["rm", "-f", name.as_str()]));
                steps.push(self.run(component));
                steps
            }
            DockerCommand::Pull => {
                if component.build.is_some() {
                    Vec::new()
                } else {
                    vec![self.docker().arg("pull").arg(compose::image_of(self.service, component))]
                }
            }
            DockerCommand::Run => vec![
                self.docker().args(["rm", "-f", name.as_str()]),
                self.run(component),
            ],
            DockerCommand::Start => vec![self.docker().args(["start", name.as_str()])],
            DockerCommand::Stop => vec![self.docker().args(["stop", name.as_str()])],
            DockerCommand::Pause => vec![self.docker().args(["pause", name.as_str()])],
            DockerCommand::Resume => vec![self.docker().args(["unpause", name.as_str()])],
            DockerCommand::Logs => vec![self.docker().args(["logs", "--tail", "200", name.as_str()])],
            DockerCommand::Delete => vec![self.docker().args(["rm", "-f", name.as_str()])],
            DockerCommand::Up
            | DockerCommand::Down
            | DockerCommand::Status
            | DockerCommand::List
            | DockerCommand::GenerateCompose => Vec::new(),
        }
    }

    fn build(&self, component: &Component, no_cache: bool) -> Option<ProcessCommand> {
        let build = component.build.as_ref()?;
        let mut command = self
            .docker()
            .arg("build")
            .args(["-t".to_string(), compose::image_of(self.service, component)]);
        if no_cache {
            command = command.arg("--no-cache");
        }
        if let Some(dockerfile) = &build.dockerfile {
            command = command
                .arg("-f")
                .arg(self.dir.join(dockerfile).display().to_string());
        }
        for (key, value) in &build.args {
            command = command.arg("--build-arg").arg(format!("{key}={value}"));
        }
        Some(command.arg(self.dir.join(&build.context).display().to_string()))
    }

    fn run(&self, component: &Component) -> ProcessCommand {
        let mut command = self
            .docker()
            .args(["run", "-d", "--name"])
            .arg(compose::container_name(self.service, component));
        for (key, value) in compose::labels(self.service, component) {
            command = command.arg("--label").arg(format!("{key}={value}"));
        }
        for port in &component.ports {
            command = command.args(["-p", port.as_str()]);
        }
        for (key, value) in &component.environment {
            command = command.arg("-e").arg(format!("{key}={value}"));
        }
        for volume in &component.volumes {
            command = command.args(["-v", volume.as_str()]);
        }
        command = command.arg(compose::image_of(self.service, component));
        if let Some(line) = component.command.as_deref() {
            match shell_words::split(line) {
                Ok(words) => command = command.args(words),
                Err(_) => command = command.arg(line),
            }
        }
        command
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::executor::{RunOptions, Tools, Worker};
    use crate::infrastructure::{BuildSpec, ContextConfig};
    use crate::pipeline::ResultState;
    use crate::workers::testing;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::sync::Arc;

    const FAKE_DOCKER: &str = r#"#!/bin/sh
echo "$*" >> "@LOG@"
if [ "$1" = "login" ]; then
  echo "stdin $(cat)" >> "@LOG@"
fi
if [ "$1" = "start" ] && [ "$2" = "api-broken" ]; then
  echo "no such container" >&2
  exit 1
fi
"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        log: PathBuf,
        ctx: WorkerContext,
    }

    fn fixture(components: Vec<Component>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let log = root.join("calls.log");
        let script = root.join("docker");
        fs::write(&script, FAKE_DOCKER.replace("@LOG@", &log.display().to_string())).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let context = ContextConfig {
            name: "dev".to_string(),
            services: vec![Service {
                name: "api".to_string(),
                components,
                ..Service::default()
            }],
            base_dir: root.clone(),
            ..ContextConfig::default()
        };
        let ctx = testing::context()
            .with_context(Arc::new(context))
            .with_options(RunOptions {
                tools: Tools {
                    docker: script.display().to_string(),
                    ..Tools::default()
                },
                ..RunOptions::default()
            });
        Fixture {
            _dir: dir,
            root,
            log,
            ctx,
        }
    }

    fn components() -> Vec<Component> {
        vec![
            Component {
                name: "db".to_string(),
                image: "postgres:16".to_string(),
                ports: vec!["5432:5432".to_string()],
                ..Component::default()
            },
            Component {
                name: "web".to_string(),
                build: Some(BuildSpec {
                    context: "web".to_string(),
                    ..BuildSpec::default()
                }),
                depends_on: vec!["db".to_string()],
                ..Component::default()
            },
            Component {
                name: "worker".to_string(),
                image: "busybox".to_string(),
                ..Component::default()
            },
        ]
    }

    fn calls(log: &Path) -> Vec<String> {
        fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn task(command: &str) -> Task {
        Task::new("docker", TaskKind::Docker)
            .with_input("command", command)
            .with_input("service", "api")
    }

    #[test]
    fn test_build_with_dependencies() {
        let f = fixture(components());
        let task = task("build")
            .with_input("component", "web")
            .with_input("buildDependencies", true);
        let result = DockerWorker.run(&task, &f.ctx);
        assert_eq!(result.state, ResultState::Executed);
        let web_context = f.root.join("api").join("web");
        assert_eq!(
            calls(&f.log),
            vec![format!("build -t api-web:local {}", web_context.display())]
        );
    }

    #[test]
    fn test_run_recreates_containers_in_order() {
        let f = fixture(components());
        let result = DockerWorker.run(&task("run").with_input("component", "db"), &f.ctx);
        assert!(result.state.is_executed());
        assert_eq!(
            calls(&f.log),
            vec![
                "rm -f api-db",
                "run -d --name api-db --label locally.component=db --label locally.service=api -p 5432:5432 postgres:16",
            ]
        );
    }

    #[test]
    fn test_up_generates_compose_file() {
        let f = fixture(components());
        let result = DockerWorker.run(&task("up"), &f.ctx);
        assert!(result.state.is_executed(), "{result}");
        let compose = f.root.join("api").join(COMPOSE_FILE);
        assert!(compose.exists());
        assert_eq!(
            calls(&f.log),
            vec![format!(
                "compose -f {} -p api up -d --remove-orphans",
                compose.display()
            )]
        );
    }

    #[test]
    fn test_failing_component_is_reported() {
        let mut components = components();
        components.push(Component {
            name: "broken".to_string(),
            image: "busybox".to_string(),
            ..Component::default()
        });
        let f = fixture(components);
        let result = DockerWorker.run(&task("start"), &f.ctx);
        assert_eq!(result.state, ResultState::Errored);
        assert!(result.error_message().contains("container=api-broken"));
        assert_eq!(calls(&f.log).len(), 4);
        assert!(f.ctx.notifier.has_errors());
    }

    #[test]
    fn test_registry_login_uses_stdin() {
        let f = fixture(components());
        let task = task("pull").with_input(
            "credentials",
            serde_json::json!({ "registry": "ghcr.io", "username": "dev", "password": "s3cret" }),
        );
        let result = DockerWorker.run(&task, &f.ctx);
        assert!(result.state.is_executed());
        assert_eq!(
            calls(&f.log),
            vec![
                "login ghcr.io --username dev --password-stdin",
                "stdin s3cret",
                "pull postgres:16",
                "pull busybox",
            ]
        );
    }

    #[test]
    fn test_list_needs_no_docker() {
        let f = fixture(components());
        let task = Task::new("list", TaskKind::Docker).with_input("command", "list");
        let result = DockerWorker.run(&task, &f.ctx);
        assert_eq!(
            result.output,
            "api/db postgres:16\napi/web api-web:local\napi/worker busybox"
        );
        assert!(calls(&f.log).is_empty());
    }

    #[test]
    fn test_unknown_service() {
        let f = fixture(components());
        let task = Task::new("x", TaskKind::Docker)
            .with_input("command", "start")
            .with_input("service", "billing");
        assert_eq!(DockerWorker.run(&task, &f.ctx).error_code, codes::NOT_FOUND);
    }

    #[test]
    fn test_without_context() {
        let ctx = testing::context();
        let result = DockerWorker.run(&task("up"), &ctx);
        assert_eq!(result.error_code, codes::NOT_FOUND);
    }
}
