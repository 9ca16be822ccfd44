// src/system/shell.rs

//! Shell sessions.
//!
//! A [`ShellControl`] is a stateful session over one shell process. It negotiates the
//! dialect, probes the OS and terminal state, runs the access gates and then renders
//! every [`CommandBuilder`] against its dialect before dispatching it.
//!
//! Sub-shells come in two shapes. When the parent's dialect can interact and the target
//! dialect has a one-shot form (`bash -c`, `powershell -Command`), the sub-shell is
//! layered on the parent's process: each command is wrapped in the inline invocation of
//! every layer, innermost first. Otherwise a new process is launched through the
//! provider. Either way the session tree lives in the [`SessionRegistry`].

use crate::{
    core::{
        cache::ShellControlCache,
        command_builder::{CommandBuilder, ExecutionContext},
        registry::SessionRegistry,
    },
    dialect::{self, DialectFamily, ShellDialect},
    models::{FilePath, OsType, SessionId, SessionState, TransportId, TtyState},
    system::{
        error::{Access, ShellError},
        executor::{CommandControl, KillHandle, ProcessControl, ProcessTimeouts, lock},
        provider::{AccessGate, GateRequest, ProcessControlProvider, run_gates},
    },
};
use log::{debug, warn};
use std::{
    fmt,
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

const TEMP_DIR_KEY: &str = "system_temporary_directory";

/// Session-wide knobs shared by a session and the sub-shells it creates.
#[derive(Clone, Default)]
pub struct ShellSettings {
    pub timeouts: ProcessTimeouts,
    pub gates: Vec<Arc<dyn AccessGate>>,
}

impl ShellSettings {
    pub fn new(timeouts: ProcessTimeouts) -> Self {
        Self {
            timeouts,
            gates: Vec::new(),
        }
    }

    pub fn with_gate(mut self, gate: impl AccessGate + 'static) -> Self {
        self.gates.push(Arc::new(gate));
        self
    }
}

impl fmt::Debug for ShellSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellSettings")
            .field("timeouts", &self.timeouts)
            .field("gates", &self.gates.len())
            .finish()
    }
}

/// The process a started session runs on, and how its commands reach it.
#[derive(Debug, Clone)]
struct TransportBinding {
    process: ProcessControl,
    /// Dialects from the process's own shell down to this session's.
    layers: Vec<ShellDialect>,
    os: OsType,
    tty: TtyState,
}

/// Published by a started session so its sub-shells can find the transport.
#[derive(Debug, Default)]
struct SessionLink {
    binding: Mutex<Option<TransportBinding>>,
}

#[derive(Debug)]
struct ParentRef {
    id: SessionId,
    link: Weak<SessionLink>,
}

/// One shell session. See the [module documentation](self).
pub struct ShellControl {
    id: SessionId,
    registry: SessionRegistry,
    provider: Arc<dyn ProcessControlProvider>,
    settings: ShellSettings,
    /// Dialect asked for by the caller. `None` negotiates with whatever starts.
    requested: Option<ShellDialect>,
    dialect: ShellDialect,
    parent: Option<ParentRef>,
    link: Arc<SessionLink>,
    binding: Option<TransportBinding>,
    owns_transport: bool,
    working_directory: Option<FilePath>,
    license_checked: bool,
    cache: ShellControlCache,
}

impl fmt::Debug for ShellControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellControl")
            .field("id", &self.id)
            .field("dialect", &self.dialect)
            .field("state", &self.state())
            .field("provider", &self.provider.describe())
            .finish()
    }
}

impl ShellControl {
    /// Creates a root session. Nothing is spawned until [`start`](Self::start).
    pub fn new(
        registry: SessionRegistry,
        provider: Arc<dyn ProcessControlProvider>,
        settings: ShellSettings,
        dialect: Option<ShellDialect>,
    ) -> Self {
        let initial = dialect
            .or_else(|| provider.effective_local_dialect())
            .unwrap_or(ShellDialect::Sh);
        let id = registry.register(None, initial);
        Self::with_id(id, registry, provider, settings, dialect, initial, None)
    }

    fn with_id(
        id: SessionId,
        registry: SessionRegistry,
        provider: Arc<dyn ProcessControlProvider>,
        settings: ShellSettings,
        requested: Option<ShellDialect>,
        dialect: ShellDialect,
        parent: Option<ParentRef>,
    ) -> Self {
        Self {
            id,
            registry,
            provider,
            settings,
            requested,
            dialect,
            parent,
            link: Arc::new(SessionLink::default()),
            binding: None,
            owns_transport: false,
            working_directory: None,
            license_checked: false,
            cache: ShellControlCache::new(),
        }
    }

    // --- ACCESSORS ---

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn dialect(&self) -> ShellDialect {
        self.dialect
    }

    pub fn state(&self) -> SessionState {
        self.registry.state(self.id).unwrap_or(SessionState::Closed)
    }

    pub fn parent_id(&self) -> Option<SessionId> {
        self.parent.as_ref().map(|p| p.id)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn provider(&self) -> &Arc<dyn ProcessControlProvider> {
        &self.provider
    }

    /// The OS behind the shell, known once started.
    pub fn os_type(&self) -> OsType {
        self.binding
            .as_ref()
            .map(|b| b.os)
            .unwrap_or_else(|| self.dialect.default_os().unwrap_or_default())
    }

    pub fn tty_state(&self) -> TtyState {
        self.binding.as_ref().map(|b| b.tty).unwrap_or_default()
    }

    pub fn transport_id(&self) -> Option<TransportId> {
        self.binding.as_ref().map(|b| b.process.id())
    }

    /// `true` if this session spawned its process rather than layering on its parent's.
    pub fn owns_transport(&self) -> bool {
        self.owns_transport
    }

    /// Whether a `cd` persists between commands. Inline sub-shells run every command in
    /// a fresh one-shot process.
    pub fn persists_working_directory(&self) -> bool {
        self.binding.as_ref().is_none_or(|b| b.layers.len() == 1)
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
            && self.binding.as_ref().is_some_and(|b| b.process.is_running())
    }

    /// Framed commands written to the underlying process so far.
    pub fn dispatched_commands(&self) -> u64 {
        self.binding.as_ref().map_or(0, |b| b.process.dispatched_commands())
    }

    /// Handle that kills the underlying process from any thread.
    pub fn kill_handle(&self) -> Option<KillHandle> {
        self.binding.as_ref().map(|b| b.process.kill_handle())
    }

    pub fn cache(&self) -> &ShellControlCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ShellControlCache {
        &mut self.cache
    }

    pub fn settings(&self) -> &ShellSettings {
        &self.settings
    }

    // --- LIFECYCLE ---

    /// Starts the session. Returns immediately if it is already running.
    pub fn start(&mut self) -> Result<&mut Self, ShellError> {
        match self.state() {
            SessionState::Running => {
                if self.binding.as_ref().is_some_and(|b| b.process.is_running()) {
                    return Ok(self);
                }
                warn!("Shell session {} lost its process.", self.id);
                self.fail();
                return Err(ShellError::SessionFailed(self.id));
            }
            SessionState::Closed | SessionState::Closing => return Err(ShellError::SessionClosed(self.id)),
            SessionState::Failed => return Err(ShellError::SessionFailed(self.id)),
            SessionState::NotStarted | SessionState::Starting => {}
        }

        self.registry.set_state(self.id, SessionState::Starting);
        match self.start_inner() {
            Ok(()) => {
                self.registry.set_dialect(self.id, self.dialect);
                self.registry.set_state(self.id, SessionState::Running);
                debug!(
                    "Shell session {} running: dialect {}, OS {:?}, TTY {}.",
                    self.id,
                    self.dialect,
                    self.os_type(),
                    self.tty_state()
                );
                Ok(self)
            }
            Err(e) => {
                debug!("Shell session {} failed to start: {}", self.id, e);
                self.fail();
                Err(e)
            }
        }
    }

    fn start_inner(&mut self) -> Result<(), ShellError> {
        // 1. Obtain a transport.
        let binding = match self.parent.as_ref() {
            None => self.spawn_transport(self.requested)?,
            Some(parent) => {
                let parent_binding = self.running_parent_binding(parent)?;
                let host = parent_binding.layers.last().copied().unwrap_or(ShellDialect::Sh);
                if host.dumb_mode().supports_any_possible_interaction()
                    && !self.dialect.spec().inline_args.is_empty()
                {
                    debug!(
                        "Layering {} session {} on transport {}.",
                        self.dialect,
                        self.id,
                        parent_binding.process.id()
                    );
                    let mut layers = parent_binding.layers;
                    layers.push(self.dialect);
                    self.registry.bind_transport(self.id, parent_binding.process.id(), false);
                    TransportBinding {
                        process: parent_binding.process,
                        layers,
                        os: parent_binding.os,
                        tty: parent_binding.tty,
                    }
                } else {
                    self.spawn_transport(Some(self.dialect))?
                }
            }
        };
        self.binding = Some(binding);

        // 2. Appliance shells only get the gates.
        if !self.dialect.dumb_mode().supports_any_possible_interaction() {
            self.check_license_or_throw()?;
            self.publish();
            return Ok(());
        }

        // 3. Negotiate the exact dialect, then probe.
        if self.requested.is_none() && self.dialect.family() == DialectFamily::Posix {
            if let Some(identify) = self.dialect.identify_command() {
                let output = self.dispatch(&identify?)?.read_stdout_or_throw()?;
                let identified = dialect::parse_identify(self.dialect, &output);
                if identified != self.dialect {
                    debug!("Session {} identified as {}.", self.id, identified);
                    self.set_negotiated_dialect(identified);
                }
            }
        }
        if self.owns_transport {
            self.probe()?;
        }

        // 4. Gates last, so they see the final dialect and terminal state.
        self.check_license_or_throw()?;
        self.publish();
        Ok(())
    }

    fn spawn_transport(&mut self, dialect: Option<ShellDialect>) -> Result<TransportBinding, ShellError> {
        let launch = self.provider.launch_for(dialect)?;
        let transport = self.registry.allocate_transport();
        let process = ProcessControl::new(transport, launch, self.settings.timeouts);
        self.registry.bind_transport(self.id, transport, true);
        self.owns_transport = true;
        process.start()?;
        self.dialect = process.dialect();
        Ok(TransportBinding {
            os: self.dialect.default_os().unwrap_or_default(),
            tty: process.tty(),
            layers: vec![process.dialect()],
            process,
        })
    }

    fn running_parent_binding(&self, parent: &ParentRef) -> Result<TransportBinding, ShellError> {
        let link = parent.link.upgrade().ok_or(ShellError::ParentNotRunning(self.id))?;
        let binding = lock(&link.binding).clone();
        match binding {
            Some(binding)
                if self.registry.state(parent.id) == Some(SessionState::Running)
                    && binding.process.is_running() =>
            {
                Ok(binding)
            }
            _ => Err(ShellError::ParentNotRunning(self.id)),
        }
    }

    fn set_negotiated_dialect(&mut self, dialect: ShellDialect) {
        self.dialect = dialect;
        if let Some(layer) = self.binding.as_mut().and_then(|b| b.layers.last_mut()) {
            *layer = dialect;
        }
    }

    /// Probes OS and terminal state of an owned transport.
    fn probe(&mut self) -> Result<(), ShellError> {
        let os = match self.dialect.default_os() {
            Some(os) => os,
            None => {
                let output = self.dispatch(&self.dialect.os_probe_command()?)?.execute()?;
                OsType::from_probe(&output.stdout)
            }
        };
        let declared = self.tty_state();
        let tty = if declared == TtyState::Absent {
            let output = self.dispatch(&self.dialect.tty_probe_command()?)?.execute()?;
            dialect::parse_tty_probe(&output.stdout)
        } else {
            declared
        };
        if let Some(binding) = self.binding.as_mut() {
            binding.os = os;
            binding.tty = tty;
        }
        Ok(())
    }

    fn publish(&self) {
        *lock(&self.link.binding) = self.binding.clone();
    }

    /// Marks this session and its inline descendants as failed and drops an owned process.
    fn fail(&mut self) {
        self.registry.close_cascade(self.id, SessionState::Failed);
        if self.owns_transport
            && let Some(binding) = self.binding.as_ref()
        {
            binding.process.kill();
        }
        *lock(&self.link.binding) = None;
    }

    /// Runs the session gates once per session.
    pub fn check_license_or_throw(&mut self) -> Result<(), ShellError> {
        if self.license_checked {
            return Ok(());
        }
        self.check_access(Access::Session)?;
        self.license_checked = true;
        Ok(())
    }

    /// Asks every gate whether `access` may be granted on this session.
    pub fn check_access(&self, access: Access) -> Result<(), ShellError> {
        let request = GateRequest {
            access,
            session: self.id,
            dialect: self.dialect,
            tty: self.tty_state(),
        };
        run_gates(&self.settings.gates, &request)
    }

    /// Creates a sub-shell speaking `dialect`. The parent is not started; the child's
    /// own [`start`](Self::start) requires the parent to be running.
    pub fn sub_shell(&self, dialect: ShellDialect) -> Self {
        let id = self.registry.register(Some(self.id), dialect);
        Self::with_id(
            id,
            self.registry.clone(),
            Arc::clone(&self.provider),
            self.settings.clone(),
            Some(dialect),
            dialect,
            Some(ParentRef {
                id: self.id,
                link: Arc::downgrade(&self.link),
            }),
        )
    }

    /// Closes the session gracefully. Errors on the way are logged and swallowed.
    pub fn close(&mut self) {
        let timeout = self.settings.timeouts.exit;
        if let Err(e) = self.exit_and_wait(timeout) {
            warn!("Graceful close of session {} failed, killing it: {}", self.id, e);
            self.kill();
        }
    }

    /// Sends the dialect's exit command and waits up to `timeout` for the process to end.
    ///
    /// On timeout the session stays open so the caller can fall back to [`kill`](Self::kill).
    pub fn exit_and_wait(&mut self, timeout: Duration) -> Result<(), ShellError> {
        if self.state().is_terminal() {
            return Ok(());
        }
        if self.owns_transport
            && let Some(binding) = self.binding.as_ref()
        {
            self.registry.set_state(self.id, SessionState::Closing);
            binding.process.exit_and_wait(timeout)?;
        }
        self.finish_close();
        Ok(())
    }

    /// Forcefully ends the session. Safe to call at any time, never blocks on I/O.
    pub fn kill(&mut self) {
        if self.owns_transport
            && let Some(binding) = self.binding.as_ref()
        {
            binding.process.kill();
        }
        self.finish_close();
    }

    fn finish_close(&mut self) {
        let closed = self.registry.close_cascade(self.id, SessionState::Closed);
        if !closed.is_empty() {
            debug!("Closed sessions {:?}.", closed);
        }
        *lock(&self.link.binding) = None;
        self.working_directory = None;
    }

    // --- COMMANDS ---

    fn ensure_running(&mut self) -> Result<(), ShellError> {
        match self.state() {
            SessionState::NotStarted => {
                self.start()?;
                Ok(())
            }
            SessionState::Running => {
                if self.binding.as_ref().is_some_and(|b| b.process.is_running()) {
                    Ok(())
                } else {
                    self.fail();
                    Err(ShellError::SessionFailed(self.id))
                }
            }
            SessionState::Failed => Err(ShellError::SessionFailed(self.id)),
            SessionState::Starting | SessionState::Closing | SessionState::Closed => {
                Err(ShellError::SessionClosed(self.id))
            }
        }
    }

    /// Renders `builder` for this session and wraps it in every inline layer.
    pub fn render(&self, builder: &CommandBuilder) -> Result<String, ShellError> {
        let ctx = ExecutionContext::new(self.dialect).with_os(self.os_type());
        let mut text = builder.build(&ctx)?;
        if let Some(binding) = self.binding.as_ref() {
            for pair in binding.layers.windows(2).rev() {
                if let [host, inner] = pair {
                    text = inner.inline_invocation(*host, &text)?;
                }
            }
        }
        Ok(text)
    }

    fn dispatch(&self, builder: &CommandBuilder) -> Result<CommandControl<'_>, ShellError> {
        let binding = self.binding.as_ref().ok_or(ShellError::SessionClosed(self.id))?;
        let text = self.render(builder)?;
        Ok(binding.process.command(text))
    }

    /// Binds a command to this session, starting it first if necessary.
    ///
    /// The returned handle borrows the session, so at most one command is in flight.
    pub fn command(&mut self, builder: impl Into<CommandBuilder>) -> Result<CommandControl<'_>, ShellError> {
        let builder = builder.into();
        self.ensure_running()?;
        self.dialect.dumb_mode().throw_if_unsupported()?;
        self.dispatch(&builder)
    }

    /// Runs to completion and returns stdout. Fails on a nonzero exit code.
    pub fn execute_simple_command(&mut self, builder: impl Into<CommandBuilder>) -> Result<String, ShellError> {
        self.command(builder)?.read_stdout_or_throw()
    }

    /// Runs a check: exit code 0 is `true`, 1 is `false`, anything else fails.
    pub fn execute_and_check(&mut self, builder: impl Into<CommandBuilder>) -> Result<bool, ShellError> {
        self.command(builder)?.execute_and_check()
    }

    pub fn discard_or_throw(&mut self, builder: impl Into<CommandBuilder>) -> Result<(), ShellError> {
        self.command(builder)?.discard_or_throw()
    }

    pub fn discard_and_check_exit(&mut self, builder: impl Into<CommandBuilder>) -> Result<bool, ShellError> {
        self.command(builder)?.discard_and_check_exit()
    }

    // --- SESSION QUERIES ---

    /// The current working directory, cached until the next [`cd`](Self::cd).
    pub fn working_directory(&mut self) -> Result<FilePath, ShellError> {
        if let Some(cwd) = &self.working_directory {
            return Ok(cwd.clone());
        }
        let command = self.dialect.pwd_command()?;
        let cwd = FilePath::of(self.execute_simple_command(command)?);
        if self.persists_working_directory() {
            self.working_directory = Some(cwd.clone());
        }
        Ok(cwd)
    }

    /// Changes the working directory. Inline sub-shells cannot keep one.
    pub fn cd(&mut self, path: &FilePath) -> Result<(), ShellError> {
        self.ensure_running()?;
        if !self.persists_working_directory() {
            return Err(ShellError::unsupported(
                self.dialect,
                "changing the directory of an inline sub-shell",
            ));
        }
        let command = self.dialect.cd_command(path)?;
        self.working_directory = None;
        self.discard_or_throw(command)
    }

    /// Value of an environment variable; `None` when unset or empty.
    pub fn env_var(&mut self, name: &str) -> Result<Option<String>, ShellError> {
        let command = self.dialect.get_env_var(name)?;
        let value = self.command(command)?.execute()?.stdout;
        let value = value.trim_end_matches(['\r', '\n']);
        Ok((!value.is_empty()).then(|| value.to_string()))
    }

    /// Whether `name` resolves to an executable. Cached per session.
    pub fn is_application_in_path(&mut self, name: &str) -> Result<bool, ShellError> {
        if let Some(present) = self.cache.application_in_path(name) {
            return Ok(present);
        }
        let command = self.dialect.which_command(name)?;
        let present = self.execute_and_check(command)?;
        self.cache.set_application_in_path(name, present);
        Ok(present)
    }

    pub fn process_exists(&mut self, pid: u32) -> Result<bool, ShellError> {
        let command = self.dialect.process_exists_command(pid)?;
        self.execute_and_check(command)
    }

    /// The system temporary directory of the shell's side. Cached per session.
    pub fn system_temporary_directory(&mut self) -> Result<FilePath, ShellError> {
        if let Some(dir) = self.cache.get::<FilePath>(TEMP_DIR_KEY) {
            return Ok(dir);
        }
        let command = self.dialect.temp_dir_command()?;
        let dir = FilePath::of(self.execute_simple_command(command)?);
        self.cache.set(TEMP_DIR_KEY, dir.clone());
        Ok(dir)
    }
}

impl Drop for ShellControl {
    fn drop(&mut self) {
        if !self.state().is_terminal() {
            if self.owns_transport {
                debug!("Shell session {} dropped while open, killing it.", self.id);
                self.kill();
            } else if self.binding.is_none() {
                self.finish_close();
            }
        }
        self.registry.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::provider::LaunchCommand;

    #[derive(Debug)]
    struct FixedProvider(LaunchCommand);

    impl ProcessControlProvider for FixedProvider {
        fn launch_for(&self, dialect: Option<ShellDialect>) -> Result<LaunchCommand, ShellError> {
            Ok(match dialect {
                Some(d) => LaunchCommand::for_dialect(d),
                None => self.0.clone(),
            })
        }

        fn effective_local_dialect(&self) -> Option<ShellDialect> {
            self.0.dialect
        }

        fn describe(&self) -> String {
            "test".to_string()
        }
    }

    fn session(launch: LaunchCommand, dialect: Option<ShellDialect>) -> ShellControl {
        ShellControl::new(
            SessionRegistry::new(),
            Arc::new(FixedProvider(launch)),
            ShellSettings::default(),
            dialect,
        )
    }

    #[test]
    fn test_render_folds_inline_layers() {
        // --- Setup ---
        let mut shell = session(LaunchCommand::new("unused"), Some(ShellDialect::Sh));
        let process = ProcessControl::new(TransportId(0), LaunchCommand::new("unused"), ProcessTimeouts::default());
        shell.binding = Some(TransportBinding {
            process,
            layers: vec![ShellDialect::Sh, ShellDialect::Bash, ShellDialect::Sh],
            os: OsType::Linux,
            tty: TtyState::Absent,
        });

        // --- Execute ---
        let text = shell.render(&CommandBuilder::of_string("echo hi")).unwrap();

        // --- Assert ---
        assert_eq!(text, "bash --noprofile --norc -c 'sh -c '\\''echo hi'\\'''");
    }

    #[test]
    fn test_unstarted_session_reports_defaults() {
        let shell = session(LaunchCommand::new("unused"), Some(ShellDialect::Cmd));

        assert_eq!(shell.state(), SessionState::NotStarted);
        assert_eq!(shell.os_type(), OsType::Windows);
        assert_eq!(shell.tty_state(), TtyState::Absent);
        assert!(shell.kill_handle().is_none());
    }

    #[test]
    fn test_sub_shell_is_registered_under_parent() {
        let parent = session(LaunchCommand::new("unused"), Some(ShellDialect::Cmd));
        let child = parent.sub_shell(ShellDialect::PowerShell);

        assert_eq!(child.parent_id(), Some(parent.id()));
        assert_eq!(child.dialect(), ShellDialect::PowerShell);
        assert_eq!(parent.registry().children(parent.id()), vec![child.id()]);
        assert_eq!(parent.state(), SessionState::NotStarted);
    }

    #[test]
    fn test_child_of_unstarted_parent_cannot_start() {
        let parent = session(LaunchCommand::new("unused"), Some(ShellDialect::Sh));
        let mut child = parent.sub_shell(ShellDialect::Bash);

        let err = child.start().unwrap_err();

        assert!(matches!(err, ShellError::ParentNotRunning(_)));
        assert_eq!(child.state(), SessionState::Failed);
    }

    #[test]
    fn test_launch_failure_fails_session() {
        let mut shell = session(
            LaunchCommand::new("/nonexistent/shellctl-no-such-shell").dialect(ShellDialect::Sh),
            None,
        );

        assert!(matches!(shell.start().unwrap_err(), ShellError::Launch { .. }));
        assert_eq!(shell.state(), SessionState::Failed);
        assert!(matches!(
            shell.execute_simple_command("echo hi").unwrap_err(),
            ShellError::SessionFailed(_)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_sh_session_lifecycle() {
        // --- Setup ---
        let mut shell = session(LaunchCommand::for_dialect(ShellDialect::Sh), None);

        // --- Execute ---
        shell.start().unwrap();
        let pid = shell.kill_handle().map(|h| h.transport());
        shell.start().unwrap();

        // --- Assert ---
        assert_eq!(shell.kill_handle().map(|h| h.transport()), pid);
        assert!(shell.dialect().is_posix());
        assert_ne!(shell.os_type(), OsType::Windows);
        assert_eq!(shell.tty_state(), TtyState::Absent);
        assert_eq!(shell.execute_simple_command("echo hello").unwrap(), "hello");
        assert!(!shell.execute_and_check("false").unwrap());

        shell.close();
        assert_eq!(shell.state(), SessionState::Closed);
        assert!(matches!(
            shell.execute_simple_command("echo hi").unwrap_err(),
            ShellError::SessionClosed(_)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_session_queries() {
        let mut shell = session(LaunchCommand::for_dialect(ShellDialect::Sh), Some(ShellDialect::Sh));
        shell.start().unwrap();

        assert!(shell.is_application_in_path("sh").unwrap());
        assert!(!shell.is_application_in_path("shellctl-surely-missing-tool").unwrap());
        assert_eq!(shell.cache().application_in_path("sh"), Some(true));
        assert_eq!(shell.env_var("SHELLCTL_SURELY_UNSET_VARIABLE").unwrap(), None);
        assert!(!shell.system_temporary_directory().unwrap().as_str().is_empty());

        shell.cd(&FilePath::of("/")).unwrap();
        assert_eq!(shell.working_directory().unwrap(), FilePath::of("/"));
        shell.kill();
    }

    #[cfg(unix)]
    #[test]
    fn test_denied_gate_fails_start_with_expected_error() {
        let mut shell = ShellControl::new(
            SessionRegistry::new(),
            Arc::new(FixedProvider(LaunchCommand::for_dialect(ShellDialect::Sh))),
            ShellSettings::default().with_gate(|_: &GateRequest| -> Result<(), String> {
                Err("no license".to_string())
            }),
            None,
        );

        let err = shell.start().unwrap_err();

        assert!(err.is_expected());
        assert_eq!(shell.state(), SessionState::Failed);
    }

    #[cfg(unix)]
    #[test]
    fn test_inline_sub_shell_shares_transport_and_closes_with_parent() {
        // --- Setup ---
        let mut parent = session(LaunchCommand::for_dialect(ShellDialect::Sh), Some(ShellDialect::Sh));
        parent.start().unwrap();
        let mut child = parent.sub_shell(ShellDialect::Sh);

        // --- Execute ---
        child.start().unwrap();
        let output = child.execute_simple_command("echo inner").unwrap();

        // --- Assert ---
        assert_eq!(output, "inner");
        assert!(!child.owns_transport());
        assert_eq!(child.transport_id(), parent.transport_id());
        assert!(matches!(
            child.cd(&FilePath::of("/")).unwrap_err(),
            ShellError::Unsupported { .. }
        ));
        assert_eq!(parent.execute_simple_command("echo outer").unwrap(), "outer");

        parent.close();
        assert_eq!(child.state(), SessionState::Closed);
        assert!(matches!(
            child.execute_simple_command("echo x").unwrap_err(),
            ShellError::SessionClosed(_)
        ));
    }
}
