//! Async execution of external commands.
//!
//! All container work is delegated to external binaries (`docker`, `crane`).
//! This module provides the single seam through which they are invoked: a
//! [`CommandRunner`] trait with a production [`TokioRunner`] implementation,
//! plus [`run_parallel`] for bounded-concurrency batches whose results are
//! always assembled in input order, never completion order.

use futures_util::StreamExt;
use std::borrow::Cow;
use std::path::PathBuf;
use std::process::Stdio;

/// Distinguished exit code signalling that the executable itself was not
/// found, as opposed to "executable ran and failed".
pub const COMMAND_NOT_FOUND_EXIT_CODE: i32 = 127;

/// How the child's standard streams are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoMode {
    /// Capture stdout and stderr into the outcome; stdin is closed.
    #[default]
    Capture,
    /// Forward stdout and stderr to the terminal live; stdin is closed.
    /// Used for long-running builds where the user wants progress output.
    Stream,
    /// Wire all three streams to the terminal. Used for interactive
    /// credential prompts.
    Inherit,
}

/// A single external command invocation.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    /// Program name or path
    pub program: String,
    /// Arguments, not shell-interpreted
    pub args: Vec<String>,
    /// Working directory for the child, defaults to the current one
    pub work_dir: Option<PathBuf>,
    /// Environment overrides applied on top of the inherited environment
    pub env: Vec<(String, String)>,
    /// Stream wiring
    pub io: IoMode,
}

impl ProcessRequest {
    /// Create a request for the given program with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: None,
            env: Vec::new(),
            io: IoMode::Capture,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Add an environment override.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the stream wiring.
    pub fn io(mut self, io: IoMode) -> Self {
        self.io = io;
        self
    }

    /// Render the invocation for log and error messages.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Result of a completed (or failed-to-spawn) command.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutcome {
    /// Exit code; [`COMMAND_NOT_FOUND_EXIT_CODE`] when the binary is missing
    pub code: i32,
    /// Captured stdout (empty unless [`IoMode::Capture`])
    pub stdout: Vec<u8>,
    /// Captured stderr (empty unless [`IoMode::Capture`])
    pub stderr: Vec<u8>,
}

impl ProcessOutcome {
    /// True if the command ran and exited zero.
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// True if the executable could not be found.
    pub fn command_not_found(&self) -> bool {
        self.code == COMMAND_NOT_FOUND_EXIT_CODE
    }

    /// Captured stdout as text.
    pub fn stdout_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    /// Captured stderr as text.
    pub fn stderr_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

/// Seam for invoking external commands.
///
/// The production implementation is [`TokioRunner`]; tests substitute a
/// scripted runner to drive workflows without a container engine.
pub trait CommandRunner: Send + Sync {
    /// Run one command to completion.
    ///
    /// A missing executable is reported as a successful `Ok` outcome with
    /// [`COMMAND_NOT_FOUND_EXIT_CODE`]; `Err` is reserved for process
    /// infrastructure failures.
    fn run(
        &self,
        request: ProcessRequest,
    ) -> impl std::future::Future<Output = std::io::Result<ProcessOutcome>> + Send;
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRunner;

impl CommandRunner for TokioRunner {
    async fn run(&self, request: ProcessRequest) -> std::io::Result<ProcessOutcome> {
        log::debug!("executing: {}", request.command_line());

        let mut command = tokio::process::Command::new(&request.program);
        command.args(&request.args);
        if let Some(dir) = &request.work_dir {
            command.current_dir(dir);
        }
        for (key, value) in &request.env {
            command.env(key, value);
        }

        let spawn_result = match request.io {
            IoMode::Capture => command.stdin(Stdio::null()).output().await.map(|output| {
                ProcessOutcome {
                    code: output.status.code().unwrap_or(-1),
                    stdout: output.stdout,
                    stderr: output.stderr,
                }
            }),
            IoMode::Stream => command
                .stdin(Stdio::null())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .map(|status| ProcessOutcome {
                    code: status.code().unwrap_or(-1),
                    ..ProcessOutcome::default()
                }),
            IoMode::Inherit => command
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .map(|status| ProcessOutcome {
                    code: status.code().unwrap_or(-1),
                    ..ProcessOutcome::default()
                }),
        };

        match spawn_result {
            Ok(outcome) => {
                log::debug!("{} exited with code {}", request.program, outcome.code);
                Ok(outcome)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("{} not found", request.program);
                Ok(ProcessOutcome {
                    code: COMMAND_NOT_FOUND_EXIT_CODE,
                    ..ProcessOutcome::default()
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Run a batch of independent commands with a concurrency ceiling.
///
/// The batch is an all-or-none join point: every member runs to completion
/// before the results are returned, one per request, in submission order.
pub async fn run_parallel<R: CommandRunner>(
    runner: &R,
    requests: Vec<ProcessRequest>,
    max_parallel: usize,
) -> Vec<std::io::Result<ProcessOutcome>> {
    futures_util::stream::iter(requests.into_iter().map(|request| runner.run(request)))
        .buffered(max_parallel.max(1))
        .collect()
        .await
}
