//! Terraform worker
//!
//! Drives the terraform CLI for the stacks of the current context. Each
//! stack moves through `init`, `validate`, `plan` and `apply` (or
//! `destroy`); commands whose prerequisite step never ran fail with a
//! sentinel such as `MissingInitWhenApplying` instead of recovering.
//!
//! `plan` writes a saved plan and reports its change summary. `output`
//! publishes the stack outputs in the `infrastructure` vault as
//! `<stack>.<output>`.

pub mod plan;
pub mod state;

pub use plan::{ChangeCounts, PlanSummary, ValidationDiagnostic, ValidationReport};
pub use state::{
    MISSING_INIT_WHEN_APPLYING, MISSING_INIT_WHEN_DESTROYING, MISSING_INIT_WHEN_PLANNING,
    MISSING_PLAN_WHEN_APPLYING, PLAN_FILE, StackState,
};

use crate::dependency::{self, DependencyError};
use crate::executor::{ProcessCommand, ProcessError, TaskWorker, WorkerContext};
use crate::pipeline::{Task, TaskKind, WorkerResult, codes};
use crate::tasks::{TerraformCommand, TerraformParameters};
use crate::vault::{INFRASTRUCTURE_VAULT, ResolverError, flatten};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors of a terraform operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TerraformError {
    /// A lifecycle step that must come first never ran
    #[error("{sentinel}: cannot {command} stack '{stack}' in state {state}")]
    MissingPrerequisite {
        /// Sentinel naming the missing step
        sentinel: &'static str,
        /// Stack name
        stack: String,
        /// Requested command
        command: TerraformCommand,
        /// Current state
        state: StackState,
    },

    /// The stack is not declared or its directory is missing
    #[error("Stack '{0}' not found")]
    StackNotFound(String),

    /// Terraform failed
    #[error("Stack '{stack}': {source}")]
    Execution {
        /// Stack name
        stack: String,
        /// Process failure
        #[source]
        source: ProcessError,
    },

    /// Terraform printed a document that could not be read
    #[error("Stack '{stack}': unreadable terraform output: {message}")]
    Output {
        /// Stack name
        stack: String,
        /// Decoder message
        message: String,
    },

    /// `validate` reported errors
    #[error("Stack '{stack}' is invalid: {summary}")]
    Invalid {
        /// Stack name
        stack: String,
        /// Error summaries
        summary: String,
    },

    /// Stack variables could not be expanded
    #[error(transparent)]
    Resolve(#[from] ResolverError),

    /// Stack dependencies could not be resolved
    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

impl TerraformError {
    /// Error code carried by the worker result
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingPrerequisite { .. } => codes::MISSING_PREREQUISITE,
            Self::StackNotFound(_) => codes::NOT_FOUND,
            Self::Resolve(_) => codes::INVALID_PARAMETERS,
            Self::Execution { .. } | Self::Output { .. } | Self::Invalid { .. } | Self::Dependency(_) => {
                codes::EXECUTION_FAILED
            }
        }
    }
}

impl From<TerraformError> for WorkerResult {
    fn from(err: TerraformError) -> Self {
        let result = WorkerResult::errored(err.code(), err.to_string());
        match &err {
            TerraformError::Execution { source, .. } => match source.exit_code() {
                Some(code) => result.with_status_code(code.to_string()),
                None => result,
            },
            _ => result,
        }
    }
}

/// A stack resolved to its directory and variables
#[derive(Debug, Clone, PartialEq, Eq)]
struct StackTarget {
    name: String,
    dir: PathBuf,
    variables: BTreeMap<String, String>,
}

/// Runs terraform commands on stacks
#[derive(Debug, Clone, Copy, Default)]
pub struct TerraformWorker;

impl TaskWorker for TerraformWorker {
    type Params = TerraformParameters;

    fn kind(&self) -> TaskKind {
        TaskKind::Terraform
    }

    fn execute(&self, params: &TerraformParameters, task: &Task, ctx: &WorkerContext) -> WorkerResult {
        let targets = match targets(params, ctx) {
            Ok(targets) => targets,
            Err(e) => return e.into(),
        };

        let mut outputs = Vec::with_capacity(targets.len());
        for target in &targets {
            tracing::info!(task = %task, stack = %target.name, command = %params.command, "Terraform");
            match run_stack(params, target, ctx) {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    tracing::warn!(stack = %target.name, error = %e, "Terraform failed");
                    return e.into();
                }
            }
        }
        WorkerResult::executed(outputs.join("\n")).with_status_code("0")
    }
}

fn targets(params: &TerraformParameters, ctx: &WorkerContext) -> Result<Vec<StackTarget>, TerraformError> {
    let Some(context) = &ctx.context else {
        let dir = ctx.workspace().join(&params.stack_name);
        if !dir.is_dir() {
            return Err(TerraformError::StackNotFound(params.stack_name.clone()));
        }
        return Ok(vec![StackTarget {
            name: params.stack_name.clone(),
            dir,
            variables: BTreeMap::new(),
        }]);
    };

    let Some(stack) = context.stack(&params.stack_name) else {
        return Err(TerraformError::StackNotFound(params.stack_name.clone()));
    };
    let mut stacks = if params.build_dependencies {
        dependency::closure(context.infrastructure.clone(), &stack.name)?
    } else {
        vec![stack.clone()]
    };
    if params.command == TerraformCommand::Destroy {
        stacks.reverse();
    }

    Ok(stacks
        .into_iter()
        .map(|s| StackTarget {
            dir: context.stack_dir(&s),
            name: s.name,
            variables: s.variables,
        })
        .collect())
}

fn run_stack(
    params: &TerraformParameters,
    target: &StackTarget,
    ctx: &WorkerContext,
) -> Result<String, TerraformError> {
    let command = params.command;
    let state = StackState::load(&target.dir);
    if let Some(sentinel) = state.missing_prerequisite(command) {
        return Err(TerraformError::MissingPrerequisite {
            sentinel,
            stack: target.name.clone(),
            command,
            state,
        });
    }
    if !target.dir.is_dir() {
        return Err(TerraformError::StackNotFound(target.name.clone()));
    }

    let mut variables = BTreeMap::new();
    for (key, value) in &target.variables {
        variables.insert(key.clone(), ctx.resolver.replace(value)?);
    }
    variables.extend(params.variables.clone());

    let stack = Stack { target, ctx };
    let output = match command {
        TerraformCommand::Init => stack.exec(&["init", "-input=false", "-no-color"], None)?,
        TerraformCommand::Validate => stack.validate()?,
        TerraformCommand::Plan => stack.plan(&variables)?,
        TerraformCommand::Apply => {
            let output = stack.exec(&["apply", "-input=false", "-no-color", PLAN_FILE], None)?;
            if let Err(e) = std::fs::remove_file(target.dir.join(PLAN_FILE)) {
                tracing::debug!(stack = %target.name, error = %e, "Saved plan not removed");
            }
            output
        }
        TerraformCommand::Destroy => stack.exec(
            &["destroy", "-input=false", "-no-color", "-auto-approve"],
            Some(&variables),
        )?,
        TerraformCommand::Output => stack.outputs()?,
        TerraformCommand::Graph => stack.capture(&["graph"])?,
        TerraformCommand::Refresh => {
            stack.exec(&["refresh", "-input=false", "-no-color"], Some(&variables))?
        }
    };

    let next = state.after(command);
    if next != state {
        if let Err(e) = next.save(&target.dir) {
            tracing::warn!(stack = %target.name, error = %e, "Stack state not saved");
        }
    }
    if matches!(
        command,
        TerraformCommand::Init | TerraformCommand::Apply | TerraformCommand::Destroy
    ) {
        ctx.notifier
            .success(format!("Stack {}: {command} completed", target.name));
    }
    Ok(output)
}

struct Stack<'a> {
    target: &'a StackTarget,
    ctx: &'a WorkerContext,
}

impl Stack<'_> {
    fn command(&self, args: &[&str]) -> ProcessCommand {
        ProcessCommand::new(&self.ctx.options.tools.terraform)
            .args(args.iter().copied())
            .current_dir(&self.target.dir)
            .env("TF_IN_AUTOMATION", "1")
    }

    fn failed(&self, source: ProcessError) -> TerraformError {
        TerraformError::Execution {
            stack: self.target.name.clone(),
            source,
        }
    }

    fn output_error(&self, err: &serde_json::Error) -> TerraformError {
        TerraformError::Output {
            stack: self.target.name.clone(),
            message: err.to_string(),
        }
    }

    /// Runs with the terminal attached when streaming is on
    fn exec(&self, args: &[&str], variables: Option<&BTreeMap<String, String>>) -> Result<String, TerraformError> {
        let mut command = self.command(args);
        if let Some(variables) = variables {
            command = command.args(var_args(variables));
        }
        command
            .streaming(self.ctx.options.stream_output)
            .run()
            .map(|r| r.stdout)
            .map_err(|e| self.failed(e))
    }

    fn capture(&self, args: &[&str]) -> Result<String, TerraformError> {
        self.command(args)
            .run()
            .map(|r| r.stdout)
            .map_err(|e| self.failed(e))
    }

    fn validate(&self) -> Result<String, TerraformError> {
        // exits non-zero on an invalid configuration but still prints the report
        let stdout = match self.command(&["validate", "-json", "-no-color"]).run() {
            Ok(result) => result.stdout,
            Err(ProcessError::Failed { stdout, .. }) if !stdout.trim().is_empty() => stdout,
            Err(e) => return Err(self.failed(e)),
        };
        let report = ValidationReport::from_json(&stdout).map_err(|e| self.output_error(&e))?;

        let name = &self.target.name;
        for diagnostic in &report.diagnostics {
            let message = if diagnostic.detail.is_empty() {
                format!("{name}: {}", diagnostic.summary)
            } else {
                format!("{name}: {}: {}", diagnostic.summary, diagnostic.detail)
            };
            if diagnostic.severity == "error" {
                self.ctx.notifier.error(message);
            } else {
                self.ctx.notifier.warning(message);
            }
        }

        if report.valid {
            Ok(format!("{name} is valid"))
        } else {
            let summary = report
                .diagnostics
                .iter()
                .filter(|d| d.severity == "error")
                .map(|d| d.summary.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            Err(TerraformError::Invalid {
                stack: name.clone(),
                summary,
            })
        }
    }

    fn plan(&self, variables: &BTreeMap<String, String>) -> Result<String, TerraformError> {
        let out = format!("-out={PLAN_FILE}");
        self.exec(&["plan", "-input=false", "-no-color", &out], Some(variables))?;
        let json = self.capture(&["show", "-json", PLAN_FILE])?;
        let summary = PlanSummary::from_json(&json).map_err(|e| self.output_error(&e))?;

        let name = &self.target.name;
        if summary.is_up_to_date() {
            self.ctx.notifier.success(format!("{name} is up to date"));
        } else {
            self.ctx.notifier.info(format!("{name}: {summary}"));
        }
        Ok(summary.to_string())
    }

    fn outputs(&self) -> Result<String, TerraformError> {
        let json = self.capture(&["output", "-json"])?;
        let document: Map<String, Value> =
            serde_json::from_str(&json).map_err(|e| self.output_error(&e))?;

        let values: Map<String, Value> = document
            .into_iter()
            .map(|(name, output)| {
                let value = match output {
                    Value::Object(mut fields) => fields.remove("value").unwrap_or(Value::Null),
                    other => other,
                };
                (name, value)
            })
            .collect();

        let entries = flatten(&values);
        for (key, value) in &entries {
            self.ctx
                .resolver
                .add(INFRASTRUCTURE_VAULT, &format!("{}.{key}", self.target.name), value.clone());
        }
        tracing::debug!(stack = %self.target.name, outputs = entries.len(), "Outputs published");
        Ok(json)
    }
}

fn var_args(variables: &BTreeMap<String, String>) -> Vec<String> {
    variables
        .iter()
        .flat_map(|(k, v)| ["-var".to_string(), format!("{k}={v}")])
        .collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::executor::{RunOptions, Tools, Worker};
    use crate::infrastructure::{ContextConfig, Stack as StackConfig};
    use crate::pipeline::ResultState;
    use crate::workers::testing;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::sync::Arc;

    const FAKE_TERRAFORM: &str = r#"#!/bin/sh
echo "$1 $(basename "$PWD")" >> "@LOG@"
case "$1" in
  init) mkdir -p .terraform ;;
  plan) touch locally.tfplan ;;
  show) echo '{"resource_changes":[{"change":{"actions":["create"]}}]}' ;;
  output) echo '{"endpoint":{"value":"http://api.local","type":"string","sensitive":false}}' ;;
  validate) echo '{"valid":true,"diagnostics":[{"severity":"warning","summary":"Deprecated"}]}' ;;
esac
"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        log: PathBuf,
        ctx: WorkerContext,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let log = root.join("calls.log");
        let script = root.join("terraform");
        fs::write(&script, FAKE_TERRAFORM.replace("@LOG@", &log.display().to_string())).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let network = StackConfig {
            name: "network".to_string(),
            ..StackConfig::default()
        };
        let db = StackConfig {
            name: "db".to_string(),
            depends_on: vec!["network".to_string()],
            variables: BTreeMap::from([("size".to_string(), "small".to_string())]),
            ..StackConfig::default()
        };
        for stack in ["network", "db"] {
            fs::create_dir(root.join(stack)).unwrap();
        }
        let context = ContextConfig {
            name: "dev".to_string(),
            infrastructure: vec![network, db],
            base_dir: root.clone(),
            ..ContextConfig::default()
        };

        let ctx = testing::context()
            .with_context(Arc::new(context))
            .with_options(RunOptions {
                tools: Tools {
                    terraform: script.display().to_string(),
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

    fn task(command: &str, stack: &str) -> Task {
        Task::new("tf", TaskKind::Terraform)
            .with_input("command", command)
            .with_input("stackName", stack)
    }

    fn calls(log: &Path) -> Vec<String> {
        fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_apply_without_init_reports_sentinel() {
        let f = fixture();
        let result = TerraformWorker.run(&task("apply", "network"), &f.ctx);
        assert_eq!(result.state, ResultState::Errored);
        assert_eq!(result.error_code, codes::MISSING_PREREQUISITE);
        assert!(result.error_message().contains(MISSING_INIT_WHEN_APPLYING));
        assert!(calls(&f.log).is_empty());
    }

    #[test]
    fn test_apply_without_plan_reports_sentinel() {
        let f = fixture();
        assert!(TerraformWorker.run(&task("init", "network"), &f.ctx).state.is_executed());
        let result = TerraformWorker.run(&task("apply", "network"), &f.ctx);
        assert!(result.error_message().contains(MISSING_PLAN_WHEN_APPLYING));
    }

    #[test]
    fn test_unknown_stack() {
        let f = fixture();
        let result = TerraformWorker.run(&task("init", "cache"), &f.ctx);
        assert_eq!(result.error_code, codes::NOT_FOUND);
    }

    #[test]
    fn test_full_lifecycle() {
        let f = fixture();
        for command in ["init", "validate", "plan", "apply", "output"] {
            let result = TerraformWorker.run(&task(command, "network"), &f.ctx);
            assert_eq!(result.state, ResultState::Executed, "{command}: {result}");
        }
        assert_eq!(StackState::load(&f.root.join("network")), StackState::Applied);
        assert!(!f.root.join("network").join(PLAN_FILE).exists());
        assert_eq!(
            f.ctx.resolver.get(INFRASTRUCTURE_VAULT, "network.endpoint"),
            Some("http://api.local".to_string())
        );
        assert!(f.ctx.notifier.has_warnings());
        assert_eq!(
            calls(&f.log),
            vec![
                "init network",
                "validate network",
                "plan network",
                "show network",
                "apply network",
                "output network",
            ]
        );
    }

    #[test]
    fn test_plan_reports_summary() {
        let f = fixture();
        TerraformWorker.run(&task("init", "db"), &f.ctx);
        let result = TerraformWorker.run(&task("plan", "db"), &f.ctx);
        assert_eq!(result.output, "1 to add, 0 to change, 0 to destroy, 0 unchanged");
        assert_eq!(StackState::load(&f.root.join("db")), StackState::Planned);
    }

    #[test]
    fn test_build_dependencies_order() {
        let f = fixture();
        let init = task("init", "db").with_input("buildDependencies", true);
        assert!(TerraformWorker.run(&init, &f.ctx).state.is_executed());
        let destroy = task("destroy", "db").with_input("buildDependencies", true);
        assert!(TerraformWorker.run(&destroy, &f.ctx).state.is_executed());
        assert_eq!(
            calls(&f.log),
            vec!["init network", "init db", "destroy db", "destroy network"]
        );
        assert_eq!(StackState::load(&f.root.join("db")), StackState::Destroyed);
    }

    #[test]
    fn test_var_args() {
        let vars = BTreeMap::from([("a".to_string(), "1".to_string())]);
        assert_eq!(var_args(&vars), vec!["-var", "a=1"]);
    }
}
