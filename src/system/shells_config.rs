// src/system/shells_config.rs

use crate::{
    core::paths::{self, PathError},
    dialect::ShellDialect,
    system::executor::ProcessTimeouts,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Failed to parse '{path}': {source}")]
    TomlParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to serialize shells config to TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Executable entry '{0}' does not name a known dialect.")]
    UnknownDialect(String),
}

/// Overrides the executable used to launch one dialect locally.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExecutableConfig {
    pub path: String,
    /// Replaces the dialect's default launch arguments when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

/// Contents of `shells.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Dialect of the local shell. Defaults to `cmd` on Windows and `sh` elsewhere.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_dialect: Option<ShellDialect>,
    pub startup_timeout_ms: u64,
    pub exit_timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_timeout_ms: Option<u64>,
    /// Set to `false` to refuse every file system view.
    pub filesystem_access: bool,
    pub executables: BTreeMap<String, ExecutableConfig>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            local_dialect: None,
            startup_timeout_ms: crate::constants::DEFAULT_STARTUP_TIMEOUT_MS,
            exit_timeout_ms: crate::constants::DEFAULT_EXIT_TIMEOUT_MS,
            command_timeout_ms: None,
            filesystem_access: true,
            executables: BTreeMap::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn timeouts(&self) -> ProcessTimeouts {
        ProcessTimeouts {
            startup: Duration::from_millis(self.startup_timeout_ms),
            exit: Duration::from_millis(self.exit_timeout_ms),
            command: self.command_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Program and arguments that launch `dialect` on this machine.
    pub fn executable_for(&self, dialect: ShellDialect) -> Result<(String, Vec<String>), PathError> {
        let defaults = || dialect.launch_args().iter().map(|a| (*a).to_string()).collect();
        match self.executables.get(dialect.id()) {
            Some(entry) => Ok((
                paths::expand_path(&entry.path)?,
                entry.args.clone().unwrap_or_else(defaults),
            )),
            None => Ok((dialect.executable().to_string(), defaults())),
        }
    }

    /// Rejects executable entries keyed by something other than a dialect identifier.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self
            .executables
            .keys()
            .find(|key| !ShellDialect::ALL.iter().any(|d| d.id() == key.as_str()))
        {
            Some(key) => Err(ConfigError::UnknownDialect(key.clone())),
            None => Ok(()),
        }
    }
}

/// Loads `shells.toml` from the configuration directory, writing a default one first
/// if none exists.
pub fn load_runtime_config() -> Result<RuntimeConfig, ConfigError> {
    let path = paths::get_shells_config_path()?;
    load_runtime_config_from(&path)
}

pub fn load_runtime_config_from(path: &Path) -> Result<RuntimeConfig, ConfigError> {
    if !path.exists() {
        let default_config = generate_default_config();
        let toml_string = toml::to_string_pretty(&default_config)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml_string)?;
        log::debug!("Wrote default shell configuration to {}", path.display());
        return Ok(default_config);
    }
    let content = fs::read_to_string(path)?;
    let config: RuntimeConfig = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
        path: path.display().to_string(),
        source: e,
    })?;
    config.validate()?;
    Ok(config)
}

/// Default configuration: records the absolute location of every dialect executable
/// found in `PATH`, so later lookups do not depend on the caller's environment.
fn generate_default_config() -> RuntimeConfig {
    let mut executables = BTreeMap::new();
    for dialect in ShellDialect::ALL {
        if !dialect.dumb_mode().supports_any_possible_interaction() {
            continue;
        }
        let name = if cfg!(target_os = "windows") {
            format!("{}.exe", dialect.executable())
        } else {
            dialect.executable().to_string()
        };
        if let Some(found) = find_executable_in_path(&name) {
            executables.insert(
                dialect.id().to_string(),
                ExecutableConfig {
                    path: found.display().to_string(),
                    args: None,
                },
            );
        }
    }
    RuntimeConfig {
        executables,
        ..RuntimeConfig::default()
    }
}

fn find_executable_in_path(executable_name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(executable_name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_first_load_writes_defaults() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("shells.toml");

        // --- Execute ---
        let first = load_runtime_config_from(&path).unwrap();
        let second = load_runtime_config_from(&path).unwrap();

        // --- Assert ---
        assert!(path.exists());
        assert_eq!(first, second);
        assert!(first.filesystem_access);
        assert_eq!(first.startup_timeout_ms, crate::constants::DEFAULT_STARTUP_TIMEOUT_MS);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shells.toml");
        fs::write(
            &path,
            "local_dialect = \"bash\"\ncommand_timeout_ms = 2500\n\n[executables.bash]\npath = \"/opt/bash/bin/bash\"\nargs = [\"--posix\"]\n",
        )
        .unwrap();

        let config = load_runtime_config_from(&path).unwrap();

        assert_eq!(config.local_dialect, Some(ShellDialect::Bash));
        assert_eq!(config.timeouts().command, Some(Duration::from_millis(2500)));
        assert_eq!(config.exit_timeout_ms, crate::constants::DEFAULT_EXIT_TIMEOUT_MS);
        let (program, args) = config.executable_for(ShellDialect::Bash).unwrap();
        assert_eq!(program, "/opt/bash/bin/bash");
        assert_eq!(args, vec!["--posix"]);
        let (program, args) = config.executable_for(ShellDialect::Zsh).unwrap();
        assert_eq!(program, "zsh");
        assert_eq!(args, vec!["-f"]);
    }

    #[test]
    fn test_unknown_executable_key_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shells.toml");
        fs::write(&path, "[executables.tcsh]\npath = \"/bin/tcsh\"\n").unwrap();

        let err = load_runtime_config_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDialect(ref key) if key == "tcsh"));
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shells.toml");
        fs::write(&path, "startup_timeout_ms = \"soon\"\n").unwrap();

        let err = load_runtime_config_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse { .. }));
        assert!(err.to_string().contains("shells.toml"));
    }
}
