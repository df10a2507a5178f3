//! Sandbox abstraction for running proposed commands.
//!
//! The [`Sandbox`] trait decouples the session loop from the container runtime.
//! Tests use scripted sandboxes that return predetermined results without
//! spawning processes.

use std::process::Command;

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::core::redact::redact_secrets;
use crate::core::truncate::{mark_truncated, tail_chars, truncate_output};
use crate::error::ShellError;
use crate::io::config::{Runtime, ShellConfig};
use crate::io::process::{MergedOutput, exit_code, run_command_merged};

/// Outcome of one command run inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// Exit code of the command; nonzero is an ordinary result.
    pub exit_code: i32,
    /// Combined stdout/stderr, already normalized to the output ceiling.
    pub output: String,
    pub truncated: bool,
}

/// Abstraction over command execution targets.
pub trait Sandbox {
    /// Run one shell command to completion.
    ///
    /// Errors only when the exec mechanism itself fails; see [`ShellError::SandboxExecFault`].
    fn run(&self, command: &str) -> Result<ExecResult>;
}

/// Sandbox that execs into a running container via `docker`/`podman exec`.
#[derive(Debug, Clone)]
pub struct ContainerSandbox {
    runtime: Runtime,
    container: String,
    max_output_chars: usize,
    redact: bool,
}

impl ContainerSandbox {
    pub fn new(config: &ShellConfig) -> Self {
        Self {
            runtime: config.runtime,
            container: config.container.clone(),
            max_output_chars: config.max_output_chars,
            redact: config.redact_secrets,
        }
    }

    /// Build `<runtime> exec -i <container> bash -lc <command>`.
    ///
    /// A login shell gives the command the PATH, expansions and chaining a user
    /// would get from an interactive terminal.
    pub fn exec_command(&self, command: &str) -> Command {
        let mut cmd = Command::new(self.runtime.binary());
        cmd.arg("exec")
            .arg("-i")
            .arg(&self.container)
            .arg("bash")
            .arg("-lc")
            .arg(command);
        cmd
    }

    /// Bytes of stream tail that always hold `max_output_chars` whole characters.
    fn keep_bytes(&self) -> usize {
        self.max_output_chars.saturating_mul(4).saturating_add(3)
    }

    /// Run an already-built exec command and normalize what it printed.
    fn run_command(&self, cmd: Command) -> Result<ExecResult> {
        let merged = run_command_merged(cmd, self.keep_bytes()).map_err(|err| {
            ShellError::SandboxExecFault {
                target: self.container.clone(),
                reason: format!("{err:#}"),
            }
        })?;
        Ok(self.finish(merged))
    }

    /// Apply the output ceiling (and redaction, when enabled) to captured output.
    fn finish(&self, merged: MergedOutput) -> ExecResult {
        let text = String::from_utf8_lossy(&merged.tail);
        let (output, truncated) = if merged.dropped > 0 {
            (mark_truncated(tail_chars(&text, self.max_output_chars)), true)
        } else {
            truncate_output(&text, self.max_output_chars)
        };
        let output = if self.redact {
            redact_secrets(&output)
        } else {
            output
        };

        // Nonzero exits are turn data, not warnings.
        let exit_code = exit_code(&merged.status);
        debug!(exit_code, truncated, "command finished in container");
        ExecResult {
            exit_code,
            output,
            truncated,
        }
    }
}

impl Sandbox for ContainerSandbox {
    #[instrument(skip_all, fields(container = %self.container, runtime = %self.runtime))]
    fn run(&self, command: &str) -> Result<ExecResult> {
        info!("running command in container");
        self.run_command(self.exec_command(command))
    }
}
