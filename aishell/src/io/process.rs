//! Helpers for running child processes with bounded output.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};
use wait_timeout::ChildExt;

/// Captured child process output with separate streams.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
}

/// Captured child process output with stdout and stderr interleaved.
#[derive(Debug)]
pub struct MergedOutput {
    pub status: ExitStatus,
    /// The trailing bytes of the combined stream.
    pub tail: Vec<u8>,
    /// Leading bytes discarded to keep `tail` bounded.
    pub dropped: usize,
}

/// Exit code of a finished process, with signals reported as `-<signal>`.
pub fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            // Callers turn this into a typed error that main prints once.
            debug!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            debug!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let stdout = join_output(stdout_handle).context("join stdout")?;
    let stderr = join_output(stderr_handle).context("join stderr")?;

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

/// Run a command to completion with stdout and stderr sharing one OS pipe.
///
/// There is no timeout: the call blocks until the child exits. Only the last
/// `keep_bytes` bytes of the combined stream are retained.
#[instrument(skip_all, fields(keep_bytes))]
pub fn run_command_merged(mut cmd: Command, keep_bytes: usize) -> Result<MergedOutput> {
    let (reader, writer) = std::io::pipe().context("create output pipe")?;
    let writer_for_stderr = writer.try_clone().context("clone output pipe")?;
    cmd.stdin(Stdio::null())
        .stdout(writer)
        .stderr(writer_for_stderr);

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            debug!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };
    // The command still owns both write ends; reads would never see EOF otherwise.
    drop(cmd);

    let (tail, dropped) = read_stream_tail(reader, keep_bytes).context("read command output")?;
    let status = child.wait().context("wait for command")?;

    if dropped > 0 {
        debug!(dropped, "discarded leading output");
    }
    debug!(exit_code = ?status.code(), "command finished");
    Ok(MergedOutput {
        status,
        tail,
        dropped,
    })
}

fn join_output(handle: thread::JoinHandle<Result<Vec<u8>>>) -> Result<Vec<u8>> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
        }
    }

    Ok(buf)
}

/// Drain `reader`, keeping only its last `keep` bytes.
fn read_stream_tail<R: Read>(mut reader: R, keep: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf: VecDeque<u8> = VecDeque::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("read output"),
        };
        buf.extend(&chunk[..n]);
        if buf.len() > keep {
            let excess = buf.len() - keep;
            buf.drain(..excess);
            dropped += excess;
        }
    }

    Ok((Vec::from(buf), dropped))
}
