//! Shell configuration: TOML file, environment overrides, command-line overrides.
//!
//! Resolution order, lowest to highest: built-in defaults, the config file
//! (`ai-shell/config.toml` under the XDG config dir), environment variables,
//! command-line flags. The result is an immutable [`ShellConfig`] built once at
//! startup and handed to each component.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::truncate::DEFAULT_MAX_OUTPUT_CHARS;
use crate::error::ShellError;

pub const ENV_CONTAINER: &str = "OAI_SHELL_CONTAINER";
pub const ENV_MODEL: &str = "OAI_MODEL";
pub const ENV_MAX_OUTPUT_CHARS: &str = "OAI_MAX_OUTPUT_CHARS";
pub const ENV_RUNTIME: &str = "AI_SHELL_RUNTIME";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_CONFIG_PATH: &str = "AI_SHELL_CONFIG";
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";

/// Container runtime CLI used for exec and inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    #[default]
    Docker,
    Podman,
}

impl Runtime {
    pub fn binary(self) -> &'static str {
        match self {
            Runtime::Docker => "docker",
            Runtime::Podman => "podman",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

impl FromStr for Runtime {
    type Err = ShellError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "docker" => Ok(Runtime::Docker),
            "podman" => Ok(Runtime::Podman),
            other => Err(ShellError::Configuration(format!(
                "invalid runtime {other:?}: must be \"docker\" or \"podman\""
            ))),
        }
    }
}

/// Shell configuration (TOML).
///
/// Missing fields default to the values the tool has always used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShellConfig {
    /// Name of the pre-existing container commands run in.
    pub container: String,

    /// Model identity sent to the oracle.
    pub model: String,

    /// Ceiling, in characters, for command output kept per turn.
    pub max_output_chars: usize,

    pub runtime: Runtime,

    /// Working directory convention communicated to the oracle.
    pub workdir: String,

    /// Base URL of the Responses API.
    pub api_base_url: String,

    /// Client-side timeout for one oracle request.
    pub oracle_timeout_secs: u64,

    /// Upper bound for the `inspect` call made by the liveness check.
    pub liveness_timeout_secs: u64,

    /// Mask `*KEY=` / `*TOKEN=` lines in command output.
    pub redact_secrets: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            container: "openai-shell".to_string(),
            model: "gpt-5".to_string(),
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
            runtime: Runtime::Docker,
            workdir: "/work".to_string(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            oracle_timeout_secs: 300,
            liveness_timeout_secs: 20,
            redact_secrets: false,
        }
    }
}

/// Values given on the command line; `None` keeps the lower layer's value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub container: Option<String>,
    pub model: Option<String>,
    pub max_output_chars: Option<usize>,
    pub runtime: Option<Runtime>,
    pub workdir: Option<String>,
}

impl ShellConfig {
    pub fn validate(&self) -> Result<()> {
        if self.container.trim().is_empty() {
            return Err(invalid("container must not be empty"));
        }
        if self.container.chars().any(char::is_whitespace) {
            return Err(invalid("container must not contain whitespace"));
        }
        if self.model.trim().is_empty() {
            return Err(invalid("model must not be empty"));
        }
        if self.max_output_chars == 0 {
            return Err(invalid("max_output_chars must be > 0"));
        }
        if self.workdir.trim().is_empty() {
            return Err(invalid("workdir must not be empty"));
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(invalid("api_base_url must start with http:// or https://"));
        }
        if self.oracle_timeout_secs == 0 {
            return Err(invalid("oracle_timeout_secs must be > 0"));
        }
        if self.liveness_timeout_secs == 0 {
            return Err(invalid("liveness_timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// Layer environment variables on top of `self`.
    ///
    /// `lookup` abstracts `std::env::var` so tests need not touch the process environment.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(container) = get(ENV_CONTAINER) {
            self.container = container;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.model = model;
        }
        if let Some(raw) = get(ENV_MAX_OUTPUT_CHARS) {
            self.max_output_chars = raw.parse().map_err(|_| {
                invalid(format!("{ENV_MAX_OUTPUT_CHARS} must be a positive integer (got {raw:?})"))
            })?;
        }
        if let Some(raw) = get(ENV_RUNTIME) {
            self.runtime = raw.parse()?;
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.api_base_url = url.trim_end_matches('/').to_string();
        }
        Ok(self)
    }

    pub fn apply_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(container) = &overrides.container {
            self.container = container.clone();
        }
        if let Some(model) = &overrides.model {
            self.model = model.clone();
        }
        if let Some(max) = overrides.max_output_chars {
            self.max_output_chars = max;
        }
        if let Some(runtime) = overrides.runtime {
            self.runtime = runtime;
        }
        if let Some(workdir) = &overrides.workdir {
            self.workdir = workdir.clone();
        }
        self
    }
}

/// Build the effective configuration from every layer and validate it.
pub fn resolve_config<F>(
    file: Option<&Path>,
    lookup: F,
    overrides: &ConfigOverrides,
) -> Result<ShellConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let base = match file {
        Some(path) => load_config(path)?,
        None => ShellConfig::default(),
    };
    let cfg = base.apply_env(lookup)?.apply_overrides(overrides);
    cfg.validate()?;
    debug!(container = %cfg.container, model = %cfg.model, runtime = %cfg.runtime, "resolved config");
    Ok(cfg)
}

/// Pick the config file: explicit flag, then `AI_SHELL_CONFIG`, then the default location.
pub fn config_path<F>(explicit: Option<&Path>, lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = lookup(ENV_CONFIG_PATH).filter(|p| !p.trim().is_empty()) {
        return Some(PathBuf::from(path.trim()));
    }
    config_dir(&lookup).map(|dir| dir.join("config.toml"))
}

/// `$XDG_CONFIG_HOME/ai-shell`, falling back to `~/.config/ai-shell`.
pub fn config_dir<F>(lookup: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(xdg) = lookup("XDG_CONFIG_HOME").filter(|v| !v.trim().is_empty()) {
        return Some(PathBuf::from(xdg.trim()).join("ai-shell"));
    }
    lookup("HOME")
        .filter(|v| !v.trim().is_empty())
        .map(|home| PathBuf::from(home).join(".config").join("ai-shell"))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ShellConfig::default()`.
pub fn load_config(path: &Path) -> Result<ShellConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config file missing, using defaults");
        return Ok(ShellConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ShellConfig = toml::from_str(&contents)
        .map_err(|err| invalid(format!("parse {}: {err}", path.display())))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ShellConfig) -> Result<()> {
    cfg.validate()?;
    let buf = render_config(cfg)?;
    write_atomic(path, &buf)
}

/// Serialize config as it would appear on disk.
pub fn render_config(cfg: &ShellConfig) -> Result<String> {
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    if !buf.ends_with('\n') {
        buf.push('\n');
    }
    Ok(buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

fn invalid(msg: impl Into<String>) -> anyhow::Error {
    ShellError::Configuration(msg.into()).into()
}

/// API credential for the oracle. Never printed.
#[derive(Clone)]
pub struct OracleCredential(String);

impl OracleCredential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Read `OPENAI_API_KEY`; absence is a startup-time configuration error.
    pub fn from_env<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(ENV_API_KEY).map(|v| v.trim().to_string()) {
            Some(key) if !key.is_empty() => Ok(Self(key)),
            _ => Err(invalid(format!(
                "missing {ENV_API_KEY}.\n\
                 Create a .env file in this directory (or ~/.config/ai-shell/.env) containing:\n  \
                 {ENV_API_KEY}=sk-..."
            ))),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OracleCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OracleCredential(***)")
    }
}
