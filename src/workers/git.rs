//! Git worker

use crate::executor::{ProcessCommand, TaskWorker, WorkerContext};
use crate::pipeline::{Task, TaskKind, WorkerResult, codes};
use crate::tasks::{GitParameters, redact_url};
use crate::workers::run_tool;

/// Clones repositories into the workspace
#[derive(Debug, Clone, Copy, Default)]
pub struct GitWorker;

impl TaskWorker for GitWorker {
    type Params = GitParameters;

    fn kind(&self) -> TaskKind {
        TaskKind::Git
    }

    fn execute(&self, params: &GitParameters, task: &Task, ctx: &WorkerContext) -> WorkerResult {
        let destination = params.destination_in(&ctx.workspace());

        if destination.exists() {
            if !params.clean {
                ctx.notifier.info(format!(
                    "{} already cloned at {}",
                    params.repository_name(),
                    destination.display()
                ));
                return WorkerResult::executed(destination.display().to_string());
            }
            tracing::info!(task = %task, path = %destination.display(), "Removing existing checkout");
            if let Err(e) = std::fs::remove_dir_all(&destination) {
                return WorkerResult::errored(
                    codes::EXECUTION_FAILED,
                    format!("cannot remove {}: {e}", destination.display()),
                );
            }
        }
        if let Some(parent) = destination.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return WorkerResult::errored(
                    codes::EXECUTION_FAILED,
                    format!("cannot create {}: {e}", parent.display()),
                );
            }
        }

        let url = params
            .credentials
            .as_ref()
            .map_or_else(|| params.repository.clone(), |c| c.inject_into_url(&params.repository));

        let mut command = ProcessCommand::new(&ctx.options.tools.git).arg("clone");
        if let Some(branch) = params.branch.as_deref().filter(|b| !b.is_empty()) {
            command = command.args(["--branch", branch]);
        }
        command = command.arg(url).arg(destination.display().to_string());

        ctx.notifier.info(format!(
            "Cloning {} into {}",
            redact_url(&params.repository),
            destination.display()
        ));
        let result = run_tool(command, ctx);
        if result.state.is_executed() {
            result.with_output(destination.display().to_string())
        } else {
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{RunOptions, Tools, Worker};
    use crate::pipeline::ResultState;
    use crate::workers::testing;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::io;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_debug_log_hides_clone_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = testing::context().with_options(RunOptions {
            tools: Tools {
                git: "true".to_string(),
                ..Tools::default()
            },
            ..RunOptions::default()
        });
        let task = Task::new("clone", TaskKind::Git)
            .with_input("repository", "https://example.com/team/api.git")
            .with_input("destination", dir.path().join("api").to_str().unwrap())
            .with_input(
                "credentials",
                serde_json::json!({ "username": "bob", "accessToken": "SUPERSECRET" }),
            );

        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let result = tracing::subscriber::with_default(subscriber, || GitWorker.run(&task, &ctx));

        assert_eq!(result.state, ResultState::Executed);
        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        assert!(output.contains("Executing process"));
        assert!(output.contains("bob:*****@example.com"));
        assert!(!output.contains("SUPERSECRET"));
    }

    #[test]
    fn test_existing_checkout_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("api")).unwrap();
        let ctx = testing::context();
        let task = Task::new("clone", TaskKind::Git)
            .with_input("repository", "https://example.com/team/api.git")
            .with_input("destination", dir.path().join("api").to_str().unwrap());
        let result = GitWorker.run(&task, &ctx);
        assert_eq!(result.state, ResultState::Executed);
        assert!(dir.path().join("api").exists());
    }

    #[test]
    fn test_clean_removes_before_cloning() {
        let dir = tempfile::tempdir().unwrap();
        let checkout = dir.path().join("api");
        std::fs::create_dir(&checkout).unwrap();
        std::fs::write(checkout.join("stale.txt"), "old").unwrap();

        let ctx = testing::context().with_options(RunOptions {
            tools: Tools {
                git: "locally-missing-git".to_string(),
                ..Tools::default()
            },
            ..RunOptions::default()
        });
        let task = Task::new("clone", TaskKind::Git)
            .with_input("repository", "https://example.com/team/api.git")
            .with_input("destination", checkout.to_str().unwrap())
            .with_input("clean", true);
        let result = GitWorker.run(&task, &ctx);
        assert_eq!(result.error_code, codes::EXECUTION_FAILED);
        assert!(!checkout.join("stale.txt").exists());
    }
}
