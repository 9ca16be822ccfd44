// src/system/mod.rs

//! # System Interaction Layer
//!
//! Everything that touches a real process lives here, from spawning a shell to
//! streaming a file through it.
//!
//! ## Modules
//!
//! - **`error`**: The [`ShellError`](error::ShellError) taxonomy shared by the whole
//!   crate, with its severity classification.
//! - **`framing`**: Per-command begin/end markers and the scanner that finds them in the
//!   output streams.
//! - **`executor`**: [`ProcessControl`](executor::ProcessControl), one child process with
//!   its stdio pipes, reader threads, deadlines and kill switch. Commands run through
//!   it one at a time.
//! - **`provider`**: How a transport is launched (locally, or behind a command prefix such
//!   as `ssh host`) and the access gates consulted before a session is used.
//! - **`shell`**: [`ShellControl`](shell::ShellControl), a session with a dialect, a parent
//!   and a lifecycle. Inline sub-shells share their parent's process.
//! - **`filesystem`**: File operations expressed as shell commands.
//! - **`script_helper`**: Executable and askpass scripts written into a session's
//!   temporary directory.
//! - **`runtime`**: [`ShellRuntime`](runtime::ShellRuntime), the context owning the session
//!   registry and the local shell.
//! - **`shells_config`**: Loading and generating `shells.toml`.

pub mod error;
pub mod executor;
pub mod filesystem;
pub mod framing;
pub mod provider;
pub mod runtime;
pub mod script_helper;
pub mod shell;
pub mod shells_config;
