//! Built-in workers
//!
//! One worker per task kind. Each implements
//! [`TaskWorker`](crate::executor::TaskWorker) and gets the shared lifecycle
//! from the blanket [`Worker`] implementation.

mod bash;
mod curl;
mod docker;
mod dotnet;
mod ef_migrations;
mod git;
mod keyvault;
mod npm;
mod sql;
pub mod terraform;
mod webclient;
mod whats_new;

pub use bash::BashWorker;
pub use curl::CurlWorker;
pub use docker::DockerWorker;
pub use dotnet::DotnetWorker;
pub use ef_migrations::EfMigrationsWorker;
pub use git::GitWorker;
pub use keyvault::KeyvaultSyncWorker;
pub use npm::NpmWorker;
pub use sql::SqlWorker;
pub use terraform::TerraformWorker;
pub use webclient::WebClientManifestWorker;
pub use whats_new::WhatsNewWorker;

use crate::executor::{ProcessCommand, ProcessError, Worker, WorkerContext};
use crate::pipeline::{WorkerResult, codes};

/// Every built-in worker, in the order of [`TaskKind::BUILTIN`](crate::pipeline::TaskKind::BUILTIN)
#[must_use]
pub fn builtin() -> Vec<Box<dyn Worker>> {
    vec![
        Box::new(BashWorker),
        Box::new(CurlWorker),
        Box::new(SqlWorker),
        Box::new(GitWorker),
        Box::new(DockerWorker),
        Box::new(TerraformWorker),
        Box::new(KeyvaultSyncWorker),
        Box::new(DotnetWorker),
        Box::new(EfMigrationsWorker),
        Box::new(NpmWorker),
        Box::new(WebClientManifestWorker),
        Box::new(WhatsNewWorker),
    ]
}

/// Folds a process failure into a worker result
pub(crate) fn process_failure(err: &ProcessError) -> WorkerResult {
    match err.exit_code() {
        Some(code) => WorkerResult::errored(codes::EXECUTION_FAILED, err.to_string())
            .with_status_code(code.to_string()),
        None => WorkerResult::errored(codes::EXECUTION_FAILED, err.to_string()),
    }
}

/// Command for `program`, running in `working_directory` when given
pub(crate) fn tool_command(
    ctx: &WorkerContext,
    program: &str,
    args: Vec<String>,
    working_directory: Option<&str>,
) -> ProcessCommand {
    let command = ProcessCommand::new(program).args(args);
    match working_directory.filter(|d| !d.trim().is_empty()) {
        Some(dir) => command.current_dir(ctx.resolve_path(dir)),
        None => command,
    }
}

/// Runs an external tool and maps its exit status
pub(crate) fn run_tool(command: ProcessCommand, ctx: &WorkerContext) -> WorkerResult {
    match command.streaming(ctx.options.stream_output).run() {
        Ok(result) => WorkerResult::executed(result.stdout)
            .with_status_code(result.exit_code.to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "Tool failed");
            process_failure(&e)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::executor::WorkerContext;
    use crate::notify::Notifier;
    use crate::vault::VariableResolver;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::Arc;
    use std::thread::JoinHandle;

    pub(crate) fn context() -> WorkerContext {
        WorkerContext::new(
            Arc::new(VariableResolver::new()),
            Arc::new(Notifier::buffered()),
        )
    }

    /// Answers one HTTP request with `status` and `body`; the handle yields
    /// the raw request
    pub(crate) fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            stream.write_all(response.as_bytes()).unwrap();
            request
        });
        (url, handle)
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_process_failure_keeps_exit_code() {
        let err = ProcessError::Failed {
            program: "sh".to_string(),
            code: 3,
            stderr: "bad".to_string(),
            stdout: String::new(),
        };
        let result = process_failure(&err);
        assert_eq!(result.error_code, codes::EXECUTION_FAILED);
        assert_eq!(result.status_code, "3");
    }

    #[test]
    fn test_run_tool_maps_missing_program() {
        let ctx = testing::context();
        let result = run_tool(ProcessCommand::new("locally-no-such-tool"), &ctx);
        assert!(result.state.is_errored());
        assert_eq!(result.status_code, "");
    }
}
