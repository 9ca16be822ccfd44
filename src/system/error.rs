// src/system/error.rs

use crate::{
    dialect::ShellDialect,
    models::{SessionId, TransportId, TtyState},
};
use std::time::Duration;
use thiserror::Error;

/// How an error should be presented. An expected error still aborts the operation;
/// it only tells the caller that a clean message is enough and no stack trace or bug
/// report is warranted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Expected,
    Unexpected,
}

/// The kind of access an [`AccessGate`](crate::system::provider::AccessGate) decides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Session,
    FileSystem,
    Terminal,
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Session => "shell session",
            Self::FileSystem => "file system",
            Self::Terminal => "terminal",
        })
    }
}

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Could not launch shell process '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error on shell transport: {0}")]
    Io(#[from] std::io::Error),
    #[error("Shell session {0} is closed.")]
    SessionClosed(SessionId),
    #[error("Shell session {0} failed and can no longer be used.")]
    SessionFailed(SessionId),
    #[error("Parent of shell session {0} is not running.")]
    ParentNotRunning(SessionId),
    #[error("Shell process {0} exited unexpectedly.")]
    ProcessDied(TransportId),
    #[error("Shell process {0} was killed.")]
    Killed(TransportId),
    #[error("Shell process {0} lost command synchronisation and was terminated.")]
    Desynchronized(TransportId),
    #[error("Timed out after {after:?} while {waiting_for}.")]
    Timeout {
        waiting_for: &'static str,
        after: Duration,
    },
    #[error("The {dialect} dialect does not support {operation}.")]
    Unsupported {
        dialect: ShellDialect,
        operation: &'static str,
    },
    #[error("{0}")]
    NoInteraction(String),
    #[error("Shell has a PTY allocated ({0}) and as a result does not support file system operations.")]
    TtyIncompatible(TtyState),
    #[error("Access to {access} denied: {reason}")]
    GateDenied { access: Access, reason: String },
    #[error("Command '{command}' exited with code {exit_code}{}", format_stderr(.stderr))]
    ProcessOutput {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    #[error("Check command '{command}' is malformed (exit code {exit_code}){}", format_stderr(.stderr))]
    MalformedCommand {
        command: String,
        exit_code: i32,
        stderr: String,
    },
    #[error("Unexpected shell output: {0}")]
    UnexpectedOutput(String),
    #[error("Invalid command argument: {0}")]
    InvalidArgument(String),
    #[error("Stream write of {expected} bytes received {actual} bytes.")]
    LengthMismatch { expected: u64, actual: u64 },
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

impl ShellError {
    /// Central policy of which failures are operational rather than faults.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Unsupported { .. }
            | Self::NoInteraction(_)
            | Self::TtyIncompatible(_)
            | Self::GateDenied { .. }
            | Self::SessionClosed(_)
            | Self::ProcessOutput { .. } => Severity::Expected,
            _ => Severity::Unexpected,
        }
    }

    pub fn is_expected(&self) -> bool {
        self.severity() == Severity::Expected
    }

    /// Errors after which the underlying process can no longer be trusted.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::ProcessDied(_)
                | Self::Killed(_)
                | Self::Desynchronized(_)
                | Self::Timeout { .. }
        )
    }

    /// Builds the error for an operation a dialect cannot perform.
    pub fn unsupported(dialect: ShellDialect, operation: &'static str) -> Self {
        Self::Unsupported { dialect, operation }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_classification() {
        let gate = ShellError::GateDenied {
            access: Access::FileSystem,
            reason: "no license".to_string(),
        };
        assert!(gate.is_expected());
        assert!(!gate.is_transport_failure());

        let died = ShellError::ProcessDied(TransportId(3));
        assert_eq!(died.severity(), Severity::Unexpected);
        assert!(died.is_transport_failure());
    }

    #[test]
    fn test_process_output_message_includes_stderr() {
        let err = ShellError::ProcessOutput {
            command: "rm /x".to_string(),
            exit_code: 1,
            stdout: String::new(),
            stderr: "rm: cannot remove '/x'\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Command 'rm /x' exited with code 1: rm: cannot remove '/x'"
        );
    }
}
