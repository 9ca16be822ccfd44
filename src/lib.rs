// src/lib.rs

//! # shellctl
//!
//! Drives long-lived shell processes (`sh`, `bash`, `zsh`, `fish`, PowerShell, `cmd`)
//! through one command, stream and file system contract.
//!
//! A [`ShellControl`] is a session on a shell process. Commands are rendered for the
//! session's [`ShellDialect`], framed with unique markers and read back with their exit
//! code. Sub-shells either layer on their parent's process or spawn their own, and a
//! [`ConnectionFileSystem`] turns any interactive session into a small file API.
//!
//! ```no_run
//! use shellctl::{ConnectionFileSystem, FilePath, ShellRuntime};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut runtime = ShellRuntime::load()?;
//! let shell = runtime.open()?;
//! println!("{}", shell.execute_simple_command("uname -a")?);
//!
//! let mut fs = ConnectionFileSystem::new(shell);
//! fs.write_all(&FilePath::of("/tmp/hello.txt"), b"hello")?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod constants;
pub mod core;
pub mod dialect;
pub mod models;
pub mod system;

pub use crate::{
    core::{command_builder::CommandBuilder, registry::SessionRegistry},
    dialect::{DialectFamily, DumbMode, ShellDialect},
    models::{FileEntry, FileKind, FilePath, OsType, SecretValue, SessionId, SessionState, TransportId, TtyState},
    system::{
        error::{Access, Severity, ShellError},
        executor::{CommandControl, ProcessControl, ProcessTimeouts, RunningCommand, StdinTransfer},
        filesystem::ConnectionFileSystem,
        provider::{AccessGate, CommandPrefixProvider, LaunchCommand, LocalProvider, ProcessControlProvider},
        runtime::ShellRuntime,
        shell::{ShellControl, ShellSettings},
    },
};
