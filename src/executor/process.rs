//! External process execution
//!
//! Runs a program with arguments in a child process, either capturing its
//! output or streaming it line by line to the terminal while also keeping a
//! copy. The working directory is set on the child only; the parent's current
//! directory never changes.
//!
//! ```rust
//! use locally::executor::ProcessCommand;
//!
//! let result = ProcessCommand::new("echo").arg("hello").run().unwrap();
//! assert_eq!(result.stdout.trim(), "hello");
//! ```

use crate::tasks::redact_url;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors raised when running a child process
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// The program could not be started
    #[error("Failed to start '{program}': {message}")]
    Spawn {
        /// Program name
        program: String,
        /// OS error
        message: String,
    },

    /// The program exited with a non-zero code
    #[error("'{program}' exited with code {code}: {stderr}")]
    Failed {
        /// Program name
        program: String,
        /// Exit code, `-1` when killed by a signal
        code: i32,
        /// Captured standard error
        stderr: String,
        /// Captured standard output
        stdout: String,
    },

    /// Reading output or waiting failed
    #[error("I/O error while running '{program}': {message}")]
    Io {
        /// Program name
        program: String,
        /// OS error
        message: String,
    },
}

impl ProcessError {
    /// Exit code of a failed program
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::Failed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// Standard output
    pub stdout: String,

    /// Standard error
    pub stderr: String,

    /// Exit code
    pub exit_code: i32,

    /// Duration of execution
    pub duration: Duration,
}

impl ProcessResult {
    /// Returns true if the program exited with 0
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Builder for a child process
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: BTreeMap<String, String>,
    stdin: Option<String>,
    streaming: bool,
}

impl ProcessCommand {
    /// Creates a command for `program`
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            stdin: None,
            streaming: false,
        }
    }

    /// Appends an argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the child's working directory
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Adds an environment variable for the child
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Adds environment variables for the child
    #[must_use]
    pub fn envs<'a>(mut self, vars: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Writes `input` to the child's standard input
    #[must_use]
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Streams output to the terminal while capturing it
    #[must_use]
    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Program name
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Command line for display, with passwords in URL arguments masked
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().map(|arg| redact_url(arg)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs the program and waits for it to exit
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Failed`] on a non-zero exit code and the other
    /// variants when the program cannot be started or observed.
    pub fn run(&self) -> Result<ProcessResult, ProcessError> {
        let start = Instant::now();
        tracing::debug!(
            command = %self.display(),
            cwd = ?self.cwd,
            streaming = self.streaming,
            "Executing process"
        );

        let mut result = if self.streaming {
            self.execute_streaming()?
        } else {
            self.execute_captured()?
        };
        result.duration = start.elapsed();

        if result.exit_code != 0 {
            return Err(ProcessError::Failed {
                program: self.program.clone(),
                code: result.exit_code,
                stderr: result.stderr,
                stdout: result.stdout,
            });
        }
        Ok(result)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd.envs(&self.env);
        cmd.stdin(if self.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    fn spawn_error(&self, e: &io::Error) -> ProcessError {
        ProcessError::Spawn {
            program: self.program.clone(),
            message: e.to_string(),
        }
    }

    fn io_error(&self, e: &io::Error) -> ProcessError {
        ProcessError::Io {
            program: self.program.clone(),
            message: e.to_string(),
        }
    }

    fn write_stdin(&self, child: &mut std::process::Child) -> Result<(), ProcessError> {
        if let (Some(input), Some(mut stdin)) = (&self.stdin, child.stdin.take()) {
            stdin
                .write_all(input.as_bytes())
                .map_err(|e| self.io_error(&e))?;
        }
        Ok(())
    }

    /// Executes with captured output
    fn execute_captured(&self) -> Result<ProcessResult, ProcessError> {
        let mut child = self.command().spawn().map_err(|e| self.spawn_error(&e))?;
        self.write_stdin(&mut child)?;
        let output = child
            .wait_with_output()
            .map_err(|e| self.io_error(&e))?;

        Ok(ProcessResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: Duration::ZERO,
        })
    }

    /// Executes with streaming output
    fn execute_streaming(&self) -> Result<ProcessResult, ProcessError> {
        let mut child = self.command().spawn().map_err(|e| self.spawn_error(&e))?;
        self.write_stdin(&mut child)?;

        let missing = || ProcessError::Io {
            program: self.program.clone(),
            message: "child output was not piped".to_string(),
        };
        let stdout = child.stdout.take().ok_or_else(missing)?;
        let stderr = child.stderr.take().ok_or_else(missing)?;

        let stdout_buffer = Arc::new(Mutex::new(String::new()));
        let stderr_buffer = Arc::new(Mutex::new(String::new()));

        let stdout_thread = {
            let buffer = Arc::clone(&stdout_buffer);
            std::thread::spawn(move || {
                for line in io::BufReader::new(stdout).lines().map_while(Result::ok) {
                    println!("{line}");
                    let mut guard = buffer.lock();
                    guard.push_str(&line);
                    guard.push('\n');
                }
            })
        };

        let stderr_thread = {
            let buffer = Arc::clone(&stderr_buffer);
            std::thread::spawn(move || {
                for line in io::BufReader::new(stderr).lines().map_while(Result::ok) {
                    eprintln!("{line}");
                    let mut guard = buffer.lock();
                    guard.push_str(&line);
                    guard.push('\n');
                }
            })
        };

        let status = child.wait().map_err(|e| self.io_error(&e))?;
        let _ = stdout_thread.join();
        let _ = stderr_thread.join();

        let stdout = stdout_buffer.lock().clone();
        let stderr = stderr_buffer.lock().clone();

        Ok(ProcessResult {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or(-1),
            duration: Duration::ZERO,
        })
    }
}
