//! Interactive shell assistant.
//!
//! Asks an oracle for one shell command at a time toward a user goal and runs
//! each command inside a named, already-running container. Commands the oracle
//! flags with `CONFIRM:` need an explicit `y` before they run.

use std::path::{Path, PathBuf};

use aishell::error::exit_code_for;
use aishell::io::config::{
    ConfigOverrides, OracleCredential, Runtime, ShellConfig, config_path, render_config,
    resolve_config, write_config,
};
use aishell::io::console::TerminalConsole;
use aishell::io::env::load_env_files;
use aishell::io::liveness::{InspectProbe, LivenessProbe};
use aishell::io::oracle::OpenAiOracle;
use aishell::io::sandbox::ContainerSandbox;
use aishell::logging;
use aishell::session::run_session;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "ai-shell",
    version,
    about = "Model-proposed shell commands, run one at a time inside a container"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug, Default)]
struct GlobalArgs {
    /// Config file (default: $XDG_CONFIG_HOME/ai-shell/config.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Load environment variables from this file instead of the usual `.env` files.
    #[arg(long, global = true, value_name = "PATH")]
    env_file: Option<PathBuf>,
    /// Name of the running container to execute commands in.
    #[arg(long, global = true)]
    container: Option<String>,
    /// Oracle model identifier.
    #[arg(long, global = true)]
    model: Option<String>,
    /// Keep at most this many trailing characters of each command's output.
    #[arg(long, global = true, value_name = "N")]
    max_output_chars: Option<usize>,
    /// Container runtime CLI: docker or podman.
    #[arg(long, global = true)]
    runtime: Option<Runtime>,
    /// Working directory inside the container, as described to the oracle.
    #[arg(long, global = true, value_name = "DIR")]
    workdir: Option<String>,
}

impl GlobalArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            container: self.container.clone(),
            model: self.model.clone(),
            max_output_chars: self.max_output_chars,
            runtime: self.runtime,
            workdir: self.workdir.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start an interactive session (default).
    Run,
    /// Verify the credential and that the container is running.
    Check,
    /// Inspect or create the config file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the resolved configuration as TOML.
    Show,
    /// Write the default config file if missing.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_code_for(&err));
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let lookup = |key: &str| std::env::var(key).ok();

    let env_files = load_env_files(cli.global.env_file.as_deref(), lookup)?;
    info!(files = ?env_files.loaded, "environment files loaded");

    let path = config_path(cli.global.config.as_deref(), lookup);
    let overrides = cli.global.overrides();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let cfg = resolve_config(path.as_deref(), lookup, &overrides)?;
            cmd_run(&cfg)
        }
        Command::Check => {
            let cfg = resolve_config(path.as_deref(), lookup, &overrides)?;
            cmd_check(&cfg)
        }
        Command::Config { action } => match action {
            ConfigAction::Show => {
                let cfg = resolve_config(path.as_deref(), lookup, &overrides)?;
                print!("{}", render_config(&cfg)?);
                Ok(())
            }
            ConfigAction::Init { force } => {
                let path = path.context("cannot locate config directory: set HOME or --config")?;
                cmd_config_init(&path, force)
            }
        },
    }
}

fn cmd_run(cfg: &ShellConfig) -> Result<()> {
    let credential = OracleCredential::from_env(|key| std::env::var(key).ok())?;
    let oracle = OpenAiOracle::new(cfg, credential)?;
    let liveness = InspectProbe::new(cfg);
    let sandbox = ContainerSandbox::new(cfg);
    let mut console = TerminalConsole::stdio();

    let outcome = run_session(cfg, &liveness, &oracle, &sandbox, &mut console)?;
    info!(
        turns = outcome.turns,
        commands = outcome.commands_executed,
        stop = ?outcome.stop,
        "session finished"
    );
    Ok(())
}

fn cmd_check(cfg: &ShellConfig) -> Result<()> {
    OracleCredential::from_env(|key| std::env::var(key).ok())?;
    InspectProbe::new(cfg).ensure_running(&cfg.container)?;
    println!("ok: container {} is running", cfg.container);
    Ok(())
}

fn cmd_config_init(path: &Path, force: bool) -> Result<()> {
    if !force && path.exists() {
        println!(
            "config already exists: {} (use --force to overwrite)",
            path.display()
        );
        return Ok(());
    }
    write_config(path, &ShellConfig::default())?;
    println!("wrote {}", path.display());
    Ok(())
}
