//! Startup check that the sandbox container exists and is running.

use std::process::Command;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::error::ShellError;
use crate::io::config::{Runtime, ShellConfig};
use crate::io::process::run_command_with_timeout;

const PROBE_OUTPUT_LIMIT_BYTES: usize = 64 * 1024;

pub trait LivenessProbe {
    /// Fail with [`ShellError::SandboxUnavailable`] unless `target` is running.
    fn ensure_running(&self, target: &str) -> Result<()>;
}

/// Probe backed by `<runtime> inspect -f {{.State.Running}}`.
#[derive(Debug, Clone)]
pub struct InspectProbe {
    runtime: Runtime,
    timeout: Duration,
}

impl InspectProbe {
    pub fn new(config: &ShellConfig) -> Self {
        Self {
            runtime: config.runtime,
            timeout: Duration::from_secs(config.liveness_timeout_secs),
        }
    }

    pub fn inspect_command(&self, target: &str) -> Command {
        let mut cmd = Command::new(self.runtime.binary());
        cmd.arg("inspect")
            .arg("-f")
            .arg("{{.State.Running}}")
            .arg(target);
        cmd
    }

    fn unavailable(&self, target: &str, details: impl Into<String>) -> anyhow::Error {
        ShellError::SandboxUnavailable {
            target: target.to_string(),
            runtime: self.runtime.to_string(),
            details: details.into(),
        }
        .into()
    }
}

impl LivenessProbe for InspectProbe {
    #[instrument(skip(self), fields(runtime = %self.runtime))]
    fn ensure_running(&self, target: &str) -> Result<()> {
        self.check_with(target, self.inspect_command(target))
    }
}

impl InspectProbe {
    /// Run an inspect command for `target` and judge its answer.
    ///
    /// Failures are returned, not logged above `debug`; the caller reports them once.
    fn check_with(&self, target: &str, cmd: Command) -> Result<()> {
        let output = match run_command_with_timeout(cmd, self.timeout, PROBE_OUTPUT_LIMIT_BYTES) {
            Ok(output) => output,
            Err(err) => {
                debug!(err = %err, "liveness probe could not run");
                return Err(self.unavailable(
                    target,
                    format!("{} inspect failed: {err:#}", self.runtime),
                ));
            }
        };

        if output.timed_out {
            return Err(self.unavailable(
                target,
                format!(
                    "{} inspect did not answer within {}s",
                    self.runtime,
                    self.timeout.as_secs()
                ),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !probe_reports_running(output.status.success(), &stdout) {
            let details = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            debug!(details = %details, "container is not running");
            return Err(self.unavailable(target, details));
        }

        debug!("container is running");
        Ok(())
    }
}

/// The probe succeeded and printed `true` for `.State.Running`.
pub fn probe_reports_running(success: bool, stdout: &str) -> bool {
    success && stdout.to_ascii_lowercase().contains("true")
}
