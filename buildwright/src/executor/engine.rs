//! Container engine invocation.

use crate::cancellation::{run_with_deadline, CancellationToken, Interrupted};
use crate::errors::ExecError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Exit status and captured output of one engine call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, or `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ProcessOutput {
    /// Creates an output with an exit code.
    #[must_use]
    pub fn exited(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Returns true for exit code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// The two container engine operations a run needs.
///
/// Implementations report launch problems, deadlines and cancellation as
/// `ExecError`; a process that ran to completion is always `Ok`, whatever its
/// exit code.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Builds `context` into an image tagged `tag`, reading the build
    /// instructions from `build_file`.
    async fn build(&self, tag: &str, build_file: &Path, context: &Path) -> Result<ProcessOutput, ExecError>;

    /// Inspects `tag`.
    async fn inspect(&self, tag: &str) -> Result<ProcessOutput, ExecError>;
}

/// Drives a Docker-compatible CLI (`docker`, `podman`, ...).
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
    timeout: Duration,
    token: Arc<CancellationToken>,
}

impl DockerCli {
    /// Creates a CLI driver for `program`.
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration, token: Arc<CancellationToken>) -> Self {
        Self {
            program: program.into(),
            timeout,
            token,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<ProcessOutput, ExecError> {
        let command_line = format!("{} {}", self.program, args.join(" "));
        debug!(command = %command_line, "Running container engine");

        let call = async {
            let child = Command::new(&self.program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| {
                    error!(command = %command_line, error = %e, "Failed to spawn container engine");
                    ExecError::Launch {
                        command: command_line.clone(),
                        message: e.to_string(),
                    }
                })?;

            child.wait_with_output().await.map_err(|e| ExecError::Launch {
                command: command_line.clone(),
                message: e.to_string(),
            })
        };

        let output = run_with_deadline(&self.token, self.timeout, call)
            .await
            .map_err(|interrupted| match interrupted {
                Interrupted::DeadlineExceeded(d) => ExecError::DeadlineExceeded {
                    command: command_line.clone(),
                    seconds: d.as_secs(),
                },
                Interrupted::Cancelled(reason) => ExecError::Cancelled {
                    command: command_line.clone(),
                    reason,
                },
            })??;

        info!(command = %command_line, code = ?output.status.code(), "Container engine finished");
        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn build(&self, tag: &str, build_file: &Path, context: &Path) -> Result<ProcessOutput, ExecError> {
        let build_file = build_file.to_string_lossy();
        let context = context.to_string_lossy();
        self.run(&["build", "-t", tag, "-f", &build_file, &context]).await
    }

    async fn inspect(&self, tag: &str) -> Result<ProcessOutput, ExecError> {
        self.run(&["inspect", tag]).await
    }
}
