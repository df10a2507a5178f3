//! Test-only scripted collaborators for driving sessions without containers or network.
//!
//! Each double replays a queue of predetermined answers and records how it was
//! called, so tests can assert on call counts and on what the oracle saw.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use crate::core::truncate::truncate_output;
use crate::error::ShellError;
use crate::io::config::{ShellConfig, write_config};
use crate::io::console::Console;
use crate::io::liveness::LivenessProbe;
use crate::io::oracle::Oracle;
use crate::io::sandbox::{ExecResult, Sandbox};

/// One scripted oracle reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Fail(String),
}

impl ScriptedReply {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    pub fn fail(reason: &str) -> Self {
        Self::Fail(reason.to_string())
    }
}

/// A `propose` call as the oracle received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleCall {
    pub goal: String,
    pub transcript: String,
}

/// Oracle that replays replies in order and answers `""` once the script runs out.
pub struct ScriptedOracle {
    replies: RefCell<VecDeque<ScriptedReply>>,
    calls: RefCell<Vec<OracleCall>>,
}

impl ScriptedOracle {
    pub fn new(replies: Vec<&str>) -> Self {
        Self::from_replies(replies.into_iter().map(ScriptedReply::text).collect())
    }

    pub fn from_replies(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<OracleCall> {
        self.calls.borrow().clone()
    }
}

impl Oracle for ScriptedOracle {
    fn propose(&self, goal: &str, transcript: &str) -> Result<String> {
        self.calls.borrow_mut().push(OracleCall {
            goal: goal.to_string(),
            transcript: transcript.to_string(),
        });
        match self.replies.borrow_mut().pop_front() {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Fail(reason)) => Err(ShellError::OracleTransport(reason).into()),
            None => Ok(String::new()),
        }
    }
}

/// One scripted sandbox run.
#[derive(Debug, Clone)]
pub enum ScriptedRun {
    Done { exit_code: i32, output: String },
    Fault(String),
}

impl ScriptedRun {
    pub fn ok(output: &str) -> Self {
        Self::exit(0, output)
    }

    pub fn exit(exit_code: i32, output: &str) -> Self {
        Self::Done {
            exit_code,
            output: output.to_string(),
        }
    }

    pub fn fault(reason: &str) -> Self {
        Self::Fault(reason.to_string())
    }
}

/// Sandbox that replays scripted runs and records every command it was given.
///
/// Raw outputs go through the same ceiling as the container sandbox.
pub struct ScriptedSandbox {
    runs: RefCell<VecDeque<ScriptedRun>>,
    commands: RefCell<Vec<String>>,
    max_output_chars: usize,
}

impl ScriptedSandbox {
    pub fn new(runs: Vec<ScriptedRun>) -> Self {
        Self::with_ceiling(runs, ShellConfig::default().max_output_chars)
    }

    pub fn with_ceiling(runs: Vec<ScriptedRun>, max_output_chars: usize) -> Self {
        Self {
            runs: RefCell::new(runs.into()),
            commands: RefCell::new(Vec::new()),
            max_output_chars,
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl Sandbox for ScriptedSandbox {
    fn run(&self, command: &str) -> Result<ExecResult> {
        self.commands.borrow_mut().push(command.to_string());
        match self.runs.borrow_mut().pop_front() {
            Some(ScriptedRun::Done { exit_code, output }) => {
                let (output, truncated) = truncate_output(&output, self.max_output_chars);
                Ok(ExecResult {
                    exit_code,
                    output,
                    truncated,
                })
            }
            Some(ScriptedRun::Fault(reason)) => Err(ShellError::SandboxExecFault {
                target: "scripted".to_string(),
                reason,
            }
            .into()),
            None => Err(anyhow!("scripted sandbox exhausted at command {command:?}")),
        }
    }
}

/// Console that answers prompts from a script; input is closed once it runs out.
pub struct ScriptedConsole {
    answers: VecDeque<String>,
    prompts: Vec<String>,
    shown: Vec<String>,
}

impl ScriptedConsole {
    pub fn new(answers: Vec<&str>) -> Self {
        Self {
            answers: answers.into_iter().map(str::to_string).collect(),
            prompts: Vec::new(),
            shown: Vec::new(),
        }
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn shown(&self) -> &[String] {
        &self.shown
    }
}

impl Console for ScriptedConsole {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.prompts.push(prompt.to_string());
        Ok(self.answers.pop_front())
    }

    fn show(&mut self, text: &str) -> Result<()> {
        self.shown.push(text.to_string());
        Ok(())
    }
}

/// Liveness probe with a fixed answer.
pub struct StaticLiveness {
    running: bool,
    calls: Cell<u32>,
}

impl StaticLiveness {
    pub fn running() -> Self {
        Self {
            running: true,
            calls: Cell::new(0),
        }
    }

    pub fn stopped() -> Self {
        Self {
            running: false,
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl LivenessProbe for StaticLiveness {
    fn ensure_running(&self, target: &str) -> Result<()> {
        self.calls.set(self.calls.get() + 1);
        if self.running {
            return Ok(());
        }
        Err(ShellError::SandboxUnavailable {
            target: target.to_string(),
            runtime: "docker".to_string(),
            details: "scripted: not running".to_string(),
        }
        .into())
    }
}

/// Temporary home directory with an isolated XDG config tree.
pub struct TestHome {
    dir: tempfile::TempDir,
}

impl TestHome {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp home")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `$XDG_CONFIG_HOME` for processes started with this home.
    pub fn xdg_config(&self) -> PathBuf {
        self.dir.path().join(".config")
    }

    pub fn config_path(&self) -> PathBuf {
        self.xdg_config().join("ai-shell").join("config.toml")
    }

    pub fn write_config(&self, config: &ShellConfig) -> Result<PathBuf> {
        let path = self.config_path();
        write_config(&path, config)?;
        Ok(path)
    }

    pub fn write_global_env(&self, contents: &str) -> Result<PathBuf> {
        let path = self.xdg_config().join("ai-shell").join(".env");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        std::fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}

/// Run `f` under a `warn`-level subscriber, as `logging::init` installs by
/// default, and return what it would have printed.
pub fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buf = LogBuffer::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let value = tracing::subscriber::with_default(subscriber, f);
    (value, buf.contents())
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
