//! Typed failures that decide how a session or the process ends.
//!
//! Functions return `anyhow::Result` and attach context freely; the binary recovers
//! the variant with `downcast_ref::<ShellError>()` to pick an exit code. A sandboxed
//! command exiting nonzero is deliberately absent: it is turn data, not an error.

use thiserror::Error;

use crate::exit_codes;

#[derive(Debug, Error)]
pub enum ShellError {
    /// Startup configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The liveness check found the container missing or stopped.
    #[error(
        "container '{target}' is not running.\n\
         Start it with:\n  {runtime} start {target}\n\
         Or recreate it with your {runtime} run command.\n\
         Details: {details}"
    )]
    SandboxUnavailable {
        target: String,
        runtime: String,
        details: String,
    },

    /// The oracle could not be reached or returned an error response.
    #[error("oracle request failed: {0}")]
    OracleTransport(String),

    /// The exec mechanism itself could not be invoked.
    #[error("cannot exec into container '{target}': {reason}")]
    SandboxExecFault { target: String, reason: String },
}

impl ShellError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ShellError::Configuration(_) => exit_codes::CONFIG,
            ShellError::SandboxUnavailable { .. } => exit_codes::SANDBOX_UNAVAILABLE,
            ShellError::OracleTransport(_) | ShellError::SandboxExecFault { .. } => {
                exit_codes::FAULT
            }
        }
    }
}

/// Map any error chain to a process exit code.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ShellError>()
        .map(ShellError::exit_code)
        .unwrap_or(exit_codes::FAULT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn unavailable_message_includes_remediation() {
        let err = ShellError::SandboxUnavailable {
            target: "openai-shell".to_string(),
            runtime: "docker".to_string(),
            details: "No such object: openai-shell".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("docker start openai-shell"));
        assert!(msg.contains("recreate"));
        assert!(msg.contains("No such object"));
    }

    #[test]
    fn exit_code_survives_context_wrapping() {
        let err = Err::<(), _>(ShellError::Configuration("missing OPENAI_API_KEY".into()))
            .context("load startup configuration")
            .unwrap_err();
        assert_eq!(exit_code_for(&err), exit_codes::CONFIG);
    }

    #[test]
    fn untyped_errors_map_to_fault() {
        let err = anyhow::anyhow!("read console input");
        assert_eq!(exit_code_for(&err), exit_codes::FAULT);
    }
}
