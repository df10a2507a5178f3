//! Loading of `.env` files into the process environment.
//!
//! Variables already present in the process environment always win; dotenvy
//! never overrides them. Among files, the first one loaded wins for the same reason.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::error::ShellError;
use crate::io::config::config_dir;

/// Which env files were loaded, in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFiles {
    pub loaded: Vec<PathBuf>,
}

/// Load env files: `explicit` if given (it must exist), otherwise `.env` from the
/// working directory or its parents, then the global `ai-shell/.env`.
pub fn load_env_files<F>(explicit: Option<&Path>, lookup: F) -> Result<EnvFiles>
where
    F: Fn(&str) -> Option<String>,
{
    let mut files = EnvFiles::default();

    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(ShellError::Configuration(format!(
                "env file not found: {}",
                path.display()
            ))
            .into());
        }
        dotenvy::from_path(path).map_err(|err| {
            ShellError::Configuration(format!("load env file {}: {err}", path.display()))
        })?;
        info!(path = %path.display(), "loaded env file");
        files.loaded.push(path.to_path_buf());
        return Ok(files);
    }

    match dotenvy::dotenv() {
        Ok(path) => {
            debug!(path = %path.display(), "loaded local env file");
            files.loaded.push(path);
        }
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(err = %err, "failed to load .env file"),
    }

    if let Some(global) = global_env_path(&lookup)
        && global.is_file()
    {
        match dotenvy::from_path(&global) {
            Ok(()) => {
                debug!(path = %global.display(), "loaded global env file");
                files.loaded.push(global);
            }
            Err(err) => warn!(err = %err, path = %global.display(), "failed to load global env file"),
        }
    }

    Ok(files)
}

/// `$XDG_CONFIG_HOME/ai-shell/.env` or `~/.config/ai-shell/.env`.
pub fn global_env_path<F>(lookup: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    config_dir(lookup).map(|dir| dir.join(".env"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::exit_code_for;
    use crate::exit_codes;

    #[test]
    fn explicit_missing_file_is_configuration_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = temp.path().join("nope.env");
        let err = load_env_files(Some(&missing), |_| None).unwrap_err();
        assert_eq!(exit_code_for(&err), exit_codes::CONFIG);
        assert!(err.to_string().contains("env file not found"));
    }

    #[test]
    fn explicit_file_is_loaded_alone() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("test.env");
        std::fs::write(&path, "AISHELL_ENV_TEST_ONLY_VAR=1\n").expect("write");
        let files = load_env_files(Some(&path), |_| None).expect("load");
        assert_eq!(files.loaded, vec![path]);
    }

    #[test]
    fn global_path_follows_config_dir() {
        let lookup = |key: &str| (key == "XDG_CONFIG_HOME").then(|| "/xdg".to_string());
        assert_eq!(
            global_env_path(&lookup),
            Some(PathBuf::from("/xdg/ai-shell/.env"))
        );
    }
}
