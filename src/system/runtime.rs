// src/system/runtime.rs

//! The local shell context.
//!
//! A [`ShellRuntime`] owns the session registry, the provider for new processes and the
//! lazily started local shell. It is created explicitly and passed to whoever needs a
//! shell; [`shutdown`](ShellRuntime::shutdown) ends its sessions.

use crate::{
    core::registry::SessionRegistry,
    dialect::ShellDialect,
    system::{
        error::{Access, ShellError},
        provider::{DenyAccess, LocalProvider, ProcessControlProvider},
        shell::{ShellControl, ShellSettings},
        shells_config::{self, ConfigError, RuntimeConfig},
    },
};
use log::{debug, warn};
use std::sync::Arc;

#[derive(Debug)]
pub struct ShellRuntime {
    registry: SessionRegistry,
    provider: Arc<dyn ProcessControlProvider>,
    settings: ShellSettings,
    local: Option<ShellControl>,
    local_powershell: Option<ShellControl>,
}

impl ShellRuntime {
    pub fn new(provider: Arc<dyn ProcessControlProvider>, settings: ShellSettings) -> Self {
        Self {
            registry: SessionRegistry::new(),
            provider,
            settings,
            local: None,
            local_powershell: None,
        }
    }

    /// A runtime forking local shells as described by `config`.
    pub fn from_config(config: RuntimeConfig) -> Self {
        let mut settings = ShellSettings::new(config.timeouts());
        if !config.filesystem_access {
            settings = settings.with_gate(DenyAccess::new(
                Access::FileSystem,
                "file system access is disabled in shells.toml",
            ));
        }
        Self::new(Arc::new(LocalProvider::new(config)), settings)
    }

    /// A runtime configured from `shells.toml`.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self::from_config(shells_config::load_runtime_config()?))
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn provider(&self) -> &Arc<dyn ProcessControlProvider> {
        &self.provider
    }

    pub fn settings(&self) -> &ShellSettings {
        &self.settings
    }

    /// Starts the local shell if needed and returns it.
    pub fn open(&mut self) -> Result<&mut ShellControl, ShellError> {
        let local = match self.local.take() {
            Some(shell) if !shell.state().is_terminal() => shell,
            _ => ShellControl::new(
                self.registry.clone(),
                Arc::clone(&self.provider),
                self.settings.clone(),
                None,
            ),
        };
        let local = self.local.insert(local);
        local.start()
    }

    pub fn with_local_shell<T>(
        &mut self,
        f: impl FnOnce(&mut ShellControl) -> Result<T, ShellError>,
    ) -> Result<T, ShellError> {
        f(self.open()?)
    }

    /// Runs `f` on a PowerShell sub-shell of the local shell, created on first use.
    pub fn with_local_powershell<T>(
        &mut self,
        f: impl FnOnce(&mut ShellControl) -> Result<T, ShellError>,
    ) -> Result<T, ShellError> {
        let dialect = if cfg!(target_os = "windows") {
            ShellDialect::PowerShell
        } else {
            ShellDialect::PowerShellCore
        };
        let shell = match self.local_powershell.take() {
            Some(shell) if !shell.state().is_terminal() => shell,
            _ => self.open()?.sub_shell(dialect),
        };
        let shell = self.local_powershell.insert(shell);
        shell.start()?;
        f(shell)
    }

    /// A new, not yet started root session on this runtime's provider.
    pub fn session(&self, dialect: Option<ShellDialect>) -> ShellControl {
        self.session_via(Arc::clone(&self.provider), dialect)
    }

    /// A new, not yet started root session on another transport.
    pub fn session_via(
        &self,
        provider: Arc<dyn ProcessControlProvider>,
        dialect: Option<ShellDialect>,
    ) -> ShellControl {
        ShellControl::new(self.registry.clone(), provider, self.settings.clone(), dialect)
    }

    /// Ends the local sessions. Without `force` each gets a graceful exit first and is
    /// killed only if that fails.
    pub fn shutdown(&mut self, force: bool) {
        let timeout = self.settings.timeouts.exit;
        for mut shell in [self.local_powershell.take(), self.local.take()].into_iter().flatten() {
            if force {
                shell.kill();
                continue;
            }
            if let Err(e) = shell.exit_and_wait(timeout) {
                warn!("Session {} did not exit in time, killing it: {}", shell.id(), e);
                shell.kill();
            }
        }
        debug!(
            "Runtime shut down, {} session(s) still open.",
            self.registry.live_sessions().len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionState;

    #[test]
    fn test_disabled_filesystem_access_installs_gate() {
        let config = RuntimeConfig {
            filesystem_access: false,
            ..RuntimeConfig::default()
        };

        let runtime = ShellRuntime::from_config(config);

        assert_eq!(runtime.settings().gates.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_open_reuses_local_shell_until_shutdown() {
        // --- Setup ---
        let config = RuntimeConfig {
            local_dialect: Some(ShellDialect::Sh),
            ..RuntimeConfig::default()
        };
        let mut runtime = ShellRuntime::from_config(config);

        // --- Execute ---
        let first = runtime.open().unwrap().id();
        let second = runtime.with_local_shell(|shell| Ok(shell.id())).unwrap();
        runtime.shutdown(false);

        // --- Assert ---
        assert_eq!(first, second);
        // Shut down sessions are dropped and pruned; their ids no longer resolve.
        assert_eq!(runtime.registry().state(first), None);
        assert!(runtime.registry().is_empty());

        let reopened = runtime.open().unwrap().id();
        assert_ne!(reopened, first);
        assert_eq!(runtime.registry().state(reopened), Some(SessionState::Running));
        runtime.shutdown(true);
    }

    #[test]
    fn test_closed_sessions_do_not_accumulate() {
        // --- Setup ---
        let runtime = ShellRuntime::from_config(RuntimeConfig::default());
        let first = runtime.session(Some(ShellDialect::Sh)).id();

        // --- Execute ---
        for _ in 0..1000 {
            let mut shell = runtime.session(Some(ShellDialect::Sh));
            let child = shell.sub_shell(ShellDialect::Bash);
            shell.close();
            drop(child);
        }

        // --- Assert ---
        assert!(runtime.registry().is_empty());
        assert!(runtime.registry().capacity() <= 2);
        assert_eq!(runtime.registry().state(first), None);
    }
}
