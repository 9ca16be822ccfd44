// src/system/provider.rs

//! Where shell processes come from, and who may use them.
//!
//! A [`ProcessControlProvider`] turns a wanted dialect into a [`LaunchCommand`]. The core
//! never knows how a transport is established: the local provider forks a shell, the
//! prefix provider runs one behind `ssh -T host` or any other command that forwards
//! stdio. [`AccessGate`]s are consulted before a session, file system or terminal is
//! handed out.

use crate::{
    dialect::ShellDialect,
    models::{SessionId, TtyState},
    system::{error::Access, error::ShellError, shells_config::RuntimeConfig},
};
use std::{fmt, path::PathBuf, process::Command};

// --- LAUNCH COMMANDS ---

/// Everything needed to spawn one shell process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    /// Dialect spoken on stdin. `None` lets the session negotiate it.
    pub dialect: Option<ShellDialect>,
    /// Terminal state the transport is known to impose.
    pub tty: TtyState,
}

impl LaunchCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            dialect: None,
            tty: TtyState::Absent,
        }
    }

    /// The dialect's own executable with the arguments that make it read stdin.
    pub fn for_dialect(dialect: ShellDialect) -> Self {
        Self::new(dialect.executable())
            .args(dialect.launch_args().iter().copied())
            .dialect(dialect)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn dialect(mut self, dialect: ShellDialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn tty(mut self, tty: TtyState) -> Self {
        self.tty = tty;
        self
    }

    /// Single-line rendering for logs.
    pub fn display(&self) -> String {
        let words = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        shlex::try_join(words).unwrap_or_else(|_| format!("{} {}", self.program, self.args.join(" ")))
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(self.env.iter().map(|(k, v)| (k, v)));
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(dunce::simplified(cwd));
        }
        cmd
    }
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

// --- PROVIDERS ---

/// Factory for the processes behind shell sessions.
pub trait ProcessControlProvider: fmt::Debug + Send + Sync {
    /// The launch command for a new process speaking `dialect`, or the provider's
    /// default shell when `None`.
    fn launch_for(&self, dialect: Option<ShellDialect>) -> Result<LaunchCommand, ShellError>;

    /// The dialect a default launch is expected to speak, if known up front.
    fn effective_local_dialect(&self) -> Option<ShellDialect>;

    fn describe(&self) -> String;
}

/// Forks shells on this machine, configured by `shells.toml`.
#[derive(Debug, Clone)]
pub struct LocalProvider {
    config: RuntimeConfig,
}

impl LocalProvider {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

impl ProcessControlProvider for LocalProvider {
    fn launch_for(&self, dialect: Option<ShellDialect>) -> Result<LaunchCommand, ShellError> {
        let dialect = dialect
            .or(self.config.local_dialect)
            .unwrap_or_else(ShellDialect::local_default);
        let (program, args) = self.config.executable_for(dialect).map_err(|e| {
            ShellError::InvalidArgument(format!("Invalid executable for {}: {}", dialect, e))
        })?;
        Ok(LaunchCommand::new(program).args(args).dialect(dialect))
    }

    fn effective_local_dialect(&self) -> Option<ShellDialect> {
        Some(
            self.config
                .local_dialect
                .unwrap_or_else(ShellDialect::local_default),
        )
    }

    fn describe(&self) -> String {
        "local machine".to_string()
    }
}

/// Runs shells behind a command that forwards stdio, e.g. `ssh -T host`.
///
/// Without a requested dialect the prefix runs alone and whatever login shell answers is
/// negotiated. With one, the dialect's executable and launch arguments are appended.
#[derive(Debug, Clone)]
pub struct CommandPrefixProvider {
    prefix: Vec<String>,
    remote_dialect: Option<ShellDialect>,
}

impl CommandPrefixProvider {
    pub fn new(prefix: Vec<String>) -> Result<Self, ShellError> {
        if prefix.is_empty() {
            return Err(ShellError::InvalidArgument("empty transport prefix".to_string()));
        }
        Ok(Self {
            prefix,
            remote_dialect: None,
        })
    }

    /// Splits a prefix written as a POSIX command line.
    pub fn parse(prefix: &str) -> Result<Self, ShellError> {
        let words = shlex::split(prefix)
            .ok_or_else(|| ShellError::InvalidArgument(format!("cannot parse transport '{}'", prefix)))?;
        Self::new(words)
    }

    /// Declares the dialect of the remote login shell.
    pub fn with_remote_dialect(mut self, dialect: ShellDialect) -> Self {
        self.remote_dialect = Some(dialect);
        self
    }
}

impl ProcessControlProvider for CommandPrefixProvider {
    fn launch_for(&self, dialect: Option<ShellDialect>) -> Result<LaunchCommand, ShellError> {
        let Some((program, rest)) = self.prefix.split_first() else {
            return Err(ShellError::InvalidArgument("empty transport prefix".to_string()));
        };
        let launch = LaunchCommand::new(program.clone()).args(rest.iter().cloned());
        Ok(match dialect {
            Some(d) if Some(d) != self.remote_dialect => launch
                .arg(d.executable())
                .args(d.launch_args().iter().copied())
                .dialect(d),
            Some(d) => launch.dialect(d),
            None => match self.remote_dialect {
                Some(d) => launch.dialect(d),
                None => launch,
            },
        })
    }

    fn effective_local_dialect(&self) -> Option<ShellDialect> {
        self.remote_dialect
    }

    fn describe(&self) -> String {
        shlex::try_join(self.prefix.iter().map(String::as_str)).unwrap_or_else(|_| self.prefix.join(" "))
    }
}

// --- ACCESS GATES ---

/// What is being asked for, and on which session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateRequest {
    pub access: Access,
    pub session: SessionId,
    pub dialect: ShellDialect,
    pub tty: TtyState,
}

/// A credential or license check run before access is granted. Returning `Err` denies
/// access with the given reason.
pub trait AccessGate: Send + Sync {
    fn check(&self, request: &GateRequest) -> Result<(), String>;
}

impl<F> AccessGate for F
where
    F: Fn(&GateRequest) -> Result<(), String> + Send + Sync,
{
    fn check(&self, request: &GateRequest) -> Result<(), String> {
        self(request)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessGate for AllowAll {
    fn check(&self, _request: &GateRequest) -> Result<(), String> {
        Ok(())
    }
}

/// Denies one kind of access unconditionally.
#[derive(Debug, Clone)]
pub struct DenyAccess {
    access: Access,
    reason: String,
}

impl DenyAccess {
    pub fn new(access: Access, reason: impl Into<String>) -> Self {
        Self {
            access,
            reason: reason.into(),
        }
    }
}

impl AccessGate for DenyAccess {
    fn check(&self, request: &GateRequest) -> Result<(), String> {
        if request.access == self.access {
            Err(self.reason.clone())
        } else {
            Ok(())
        }
    }
}

/// Runs every gate in order and fails on the first denial.
pub(crate) fn run_gates(
    gates: &[std::sync::Arc<dyn AccessGate>],
    request: &GateRequest,
) -> Result<(), ShellError> {
    for gate in gates {
        if let Err(reason) = gate.check(request) {
            return Err(ShellError::GateDenied {
                access: request.access,
                reason,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn request(access: Access) -> GateRequest {
        GateRequest {
            access,
            session: SessionId(0),
            dialect: ShellDialect::Sh,
            tty: TtyState::Absent,
        }
    }

    #[test]
    fn test_launch_for_dialect_uses_launch_args() {
        let launch = LaunchCommand::for_dialect(ShellDialect::Bash);
        assert_eq!(launch.program, "bash");
        assert_eq!(launch.args, vec!["--noprofile", "--norc"]);
        assert_eq!(launch.dialect, Some(ShellDialect::Bash));
        assert_eq!(launch.display(), "bash --noprofile --norc");
    }

    #[test]
    fn test_prefix_provider_appends_requested_dialect() {
        let provider = CommandPrefixProvider::parse("ssh -T 'my host'").unwrap();

        let default = provider.launch_for(None).unwrap();
        assert_eq!(default.program, "ssh");
        assert_eq!(default.args, vec!["-T", "my host"]);
        assert_eq!(default.dialect, None);

        let pwsh = provider.launch_for(Some(ShellDialect::PowerShellCore)).unwrap();
        assert_eq!(pwsh.args.get(2).map(String::as_str), Some("pwsh"));
        assert_eq!(pwsh.dialect, Some(ShellDialect::PowerShellCore));
    }

    #[test]
    fn test_prefix_provider_rejects_empty_prefix() {
        assert!(CommandPrefixProvider::parse("").is_err());
        assert!(CommandPrefixProvider::parse("ssh 'unterminated").is_err());
    }

    #[test]
    fn test_local_provider_honours_configured_dialect() {
        let config = RuntimeConfig {
            local_dialect: Some(ShellDialect::Dash),
            ..RuntimeConfig::default()
        };
        let provider = LocalProvider::new(config);

        let launch = provider.launch_for(None).unwrap();
        assert_eq!(launch.dialect, Some(ShellDialect::Dash));
        assert_eq!(launch.program, "dash");
        assert_eq!(provider.effective_local_dialect(), Some(ShellDialect::Dash));
    }

    #[test]
    fn test_gates_run_in_order() {
        let gates: Vec<Arc<dyn AccessGate>> = vec![
            Arc::new(AllowAll),
            Arc::new(DenyAccess::new(Access::FileSystem, "disabled")),
            Arc::new(|_: &GateRequest| -> Result<(), String> { Err("no session access".to_string()) }),
        ];

        let err = run_gates(&gates, &request(Access::FileSystem)).unwrap_err();
        assert!(matches!(err, ShellError::GateDenied { access: Access::FileSystem, ref reason } if reason == "disabled"));

        let err = run_gates(&gates, &request(Access::Session)).unwrap_err();
        assert!(matches!(err, ShellError::GateDenied { access: Access::Session, .. }));
        assert!(err.is_expected());
    }
}
