// src/core/paths.rs

use crate::constants::{CONFIG_DIR_ENV, CONFIG_DIR_NAME, SHELLS_CONFIG_FILENAME};
use lazy_static::lazy_static;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

lazy_static! {
    static ref CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Could not create config directory at '{path}': {source}")]
    ConfigDirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to expand path '{path}': {reason}")]
    Expansion { path: String, reason: String },
}

/// Returns the path to the shellctl configuration directory (`~/.config/shellctl`),
/// or the directory named by `SHELLCTL_CONFIG_DIR`. Creates it if it doesn't exist.
///
/// This function is memoized: the first call computes and caches the path,
/// subsequent calls return the cached value instantly.
pub fn get_config_dir() -> Result<PathBuf, PathError> {
    let mut cached_path_guard = CONFIG_DIR.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(path) = &*cached_path_guard {
        return Ok(path.clone());
    }

    // --- Cache miss: compute the path for the first time ---

    // 1. An explicit override wins over the platform directory.
    let config_path = match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::config_dir()
            .ok_or(PathError::ConfigDirNotFound)?
            .join(CONFIG_DIR_NAME),
    };

    // 2. Ensure the directory exists on the filesystem.
    if !config_path.exists() {
        fs::create_dir_all(&config_path).map_err(|e| PathError::ConfigDirCreation {
            path: config_path.display().to_string(),
            source: e,
        })?;
    }

    // 3. Store the computed path in the cache for future calls.
    *cached_path_guard = Some(config_path.clone());
    Ok(config_path)
}

/// Returns the path to `shells.toml`.
pub fn get_shells_config_path() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join(SHELLS_CONFIG_FILENAME))
}

/// Expands the home directory (`~`) and environment variables (`$VAR`, `${VAR}`) in a
/// configured path.
pub fn expand_path(template: &str) -> Result<String, PathError> {
    shellexpand::full(template)
        .map(|expanded| expanded.into_owned())
        .map_err(|e| PathError::Expansion {
            path: template.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_path_leaves_plain_paths_alone() {
        assert_eq!(expand_path("/usr/bin/bash").unwrap(), "/usr/bin/bash");
        assert_eq!(expand_path("pwsh").unwrap(), "pwsh");
    }

    #[test]
    fn test_expand_path_resolves_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let expanded = expand_path("~/bin/zsh").unwrap();
        assert_eq!(PathBuf::from(expanded), home.join("bin/zsh"));
    }

    #[test]
    fn test_expand_path_reports_unknown_variables() {
        let err = expand_path("$SHELLCTL_SURELY_UNDEFINED_VARIABLE/sh").unwrap_err();
        assert!(matches!(err, PathError::Expansion { .. }));
    }
}
