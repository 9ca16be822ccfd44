// src/constants.rs

/// Prefix of every command frame marker. A fresh UUID follows it per command.
pub const MARKER_PREFIX: &str = "SHELLCTL-";

/// The name of the configuration directory (in ~/.config/).
pub const CONFIG_DIR_NAME: &str = "shellctl";

/// The name of the runtime configuration file (inside the configuration directory).
pub const SHELLS_CONFIG_FILENAME: &str = "shells.toml";

/// Environment variable that overrides the configuration directory.
pub const CONFIG_DIR_ENV: &str = "SHELLCTL_CONFIG_DIR";

/// Prefix of generated script file names in a shell's temporary directory.
pub const SCRIPT_PREFIX: &str = "shellctl-";

pub const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_EXIT_TIMEOUT_MS: u64 = 5_000;
