// src/system/filesystem.rs

//! A POSIX-like file API on top of one shell session.
//!
//! Every operation is one command rendered by the session's dialect, or one streaming
//! command for reads and writes. [`ConnectionFileSystem::open`] is the single gate in
//! front of all of them: it rejects shells that cannot run commands, terminals that
//! would corrupt payloads, and sessions whose file system access is denied.

use crate::{
    dialect::{self, ShellDialect},
    models::{FileEntry, FilePath},
    system::{
        error::{Access, ShellError},
        executor::{RunningCommand, StdinTransfer},
        shell::ShellControl,
    },
};
use log::{debug, warn};
use std::io::{Read, Write};

/// File system view of a session. Borrows the session; owns nothing.
#[derive(Debug)]
pub struct ConnectionFileSystem<'a> {
    shell: &'a mut ShellControl,
    opened: bool,
}

impl<'a> ConnectionFileSystem<'a> {
    pub fn new(shell: &'a mut ShellControl) -> Self {
        Self { shell, opened: false }
    }

    pub fn shell(&mut self) -> &mut ShellControl {
        self.shell
    }

    fn dialect(&self) -> ShellDialect {
        self.shell.dialect()
    }

    /// Starts the session and verifies it can serve file operations.
    pub fn open(&mut self) -> Result<(), ShellError> {
        if self.opened && self.shell.is_running() {
            return Ok(());
        }
        self.shell.start()?;

        // 1. Shells that cannot run anything are closed right away.
        let dumb_mode = self.dialect().dumb_mode();
        if !dumb_mode.supports_any_possible_interaction() {
            debug!("Closing session {}: it cannot serve a file system.", self.shell.id());
            self.shell.close();
            return dumb_mode.throw_if_unsupported();
        }

        // 2. Payloads must travel unmodified in both directions.
        let tty = self.shell.tty_state();
        if !tty.preserves_output() || !tty.supports_input() {
            return Err(ShellError::TtyIncompatible(tty));
        }

        // 3. Gates.
        self.shell.check_access(Access::FileSystem)?;
        self.opened = true;
        Ok(())
    }

    fn ensure_open(&mut self) -> Result<(), ShellError> {
        if self.opened {
            return Ok(());
        }
        self.open()
    }

    /// Streams the contents of a file.
    pub fn open_input(&mut self, path: &FilePath) -> Result<RunningCommand<'_>, ShellError> {
        self.ensure_open()?;
        let command = self.dialect().file_read_command(path)?;
        self.shell.command(command)?.start_external_stdout()
    }

    /// Creates or truncates a file that must receive exactly `size` bytes.
    pub fn open_output(&mut self, path: &FilePath, size: u64) -> Result<StdinTransfer<'_>, ShellError> {
        self.ensure_open()?;
        let command = self.dialect().stream_file_write_command(path, size)?;
        self.shell.command(command)?.start_external_stdin(size)
    }

    pub fn file_exists(&mut self, path: &FilePath) -> Result<bool, ShellError> {
        self.ensure_open()?;
        let command = self.dialect().file_exists_command(path)?;
        self.shell.execute_and_check(command)
    }

    pub fn delete(&mut self, path: &FilePath) -> Result<(), ShellError> {
        self.ensure_open()?;
        let command = self.dialect().delete_file_or_directory(path)?;
        self.shell.discard_or_throw(command)
    }

    pub fn copy(&mut self, from: &FilePath, to: &FilePath) -> Result<(), ShellError> {
        self.ensure_open()?;
        let command = self.dialect().file_copy_command(from, to)?;
        self.shell.discard_or_throw(command)
    }

    pub fn move_to(&mut self, from: &FilePath, to: &FilePath) -> Result<(), ShellError> {
        self.ensure_open()?;
        let command = self.dialect().file_move_command(from, to)?;
        self.shell.discard_or_throw(command)
    }

    pub fn mkdirs(&mut self, path: &FilePath) -> Result<(), ShellError> {
        self.ensure_open()?;
        let command = self.dialect().mkdirs_command(path)?;
        self.shell.discard_or_throw(command)
    }

    pub fn touch(&mut self, path: &FilePath) -> Result<(), ShellError> {
        self.ensure_open()?;
        let command = self.dialect().file_touch_command(path)?;
        self.shell.discard_or_throw(command)
    }

    /// Creates `link` pointing at `target`.
    pub fn symbolic_link(&mut self, link: &FilePath, target: &FilePath) -> Result<(), ShellError> {
        self.ensure_open()?;
        let command = self.dialect().symbolic_link(link, target)?;
        self.shell.discard_or_throw(command)
    }

    pub fn directory_exists(&mut self, path: &FilePath) -> Result<bool, ShellError> {
        self.ensure_open()?;
        let command = self.dialect().directory_exists(path)?;
        self.shell.execute_and_check(command)
    }

    /// Direct children of `dir`, without `.` and `..`.
    pub fn list_files(&mut self, dir: &FilePath) -> Result<Vec<FileEntry>, ShellError> {
        self.ensure_open()?;
        let command = self.dialect().list_files(dir)?;
        let output = self.shell.command(command)?.read_stdout_or_throw()?;
        dialect::parse_file_listing(dir, &output)
    }

    pub fn list_roots(&mut self) -> Result<Vec<FilePath>, ShellError> {
        self.ensure_open()?;
        let command = self.dialect().list_roots()?;
        let output = self.shell.execute_simple_command(command)?;
        Ok(dialect::parse_roots(&output))
    }

    pub fn get_file_size(&mut self, path: &FilePath) -> Result<u64, ShellError> {
        self.ensure_open()?;
        let command = self.dialect().query_file_size(path)?;
        let output = self.shell.execute_simple_command(command)?;
        dialect::parse_file_size(&output)
    }

    /// Whether the session may enter `path`. The working directory is restored afterwards.
    pub fn directory_accessible(&mut self, path: &FilePath) -> Result<bool, ShellError> {
        self.ensure_open()?;
        let command = self.dialect().cd_command(path)?;
        if !self.shell.persists_working_directory() {
            return self.shell.discard_and_check_exit(command);
        }

        let original = self.shell.working_directory()?;
        let mut shell = scopeguard::guard(&mut *self.shell, |shell| {
            if let Err(e) = shell.cd(&original) {
                warn!("Could not return to '{}' on session {}: {}", original, shell.id(), e);
            }
        });
        shell.discard_and_check_exit(command)
    }

    /// Writes `content` as a script for this dialect and marks it executable.
    pub fn write_script_file(&mut self, path: &FilePath, content: &str) -> Result<(), ShellError> {
        let prepared = self.dialect().prepare_script_content(content);
        self.write_all(path, prepared.as_bytes())?;
        let command = self.dialect().make_executable_command(path)?;
        self.shell.discard_or_throw(command)
    }

    pub fn read_all(&mut self, path: &FilePath) -> Result<Vec<u8>, ShellError> {
        let mut input = self.open_input(path)?;
        let content = input.read_all()?;
        input.close_or_throw()?;
        Ok(content)
    }

    pub fn read_to_string(&mut self, path: &FilePath) -> Result<String, ShellError> {
        let bytes = self.read_all(path)?;
        String::from_utf8(bytes)
            .map_err(|_| ShellError::UnexpectedOutput(format!("'{}' is not valid UTF-8", path)))
    }

    pub fn write_all(&mut self, path: &FilePath, content: &[u8]) -> Result<(), ShellError> {
        let mut output = self.open_output(path, content.len() as u64)?;
        output.write_all(content)?;
        output.finish()
    }

    /// Copies everything from `reader` into a new file of exactly `size` bytes.
    pub fn upload(&mut self, path: &FilePath, size: u64, reader: &mut impl Read) -> Result<(), ShellError> {
        let mut output = self.open_output(path, size)?;
        std::io::copy(&mut reader.take(size), &mut output)?;
        output.finish()
    }

    /// Best-effort shutdown of the underlying session. Never fails.
    pub fn close(&mut self) {
        self.opened = false;
        self.shell.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::registry::SessionRegistry,
        models::SessionState,
        system::{provider::LocalProvider, shell::ShellSettings, shells_config::RuntimeConfig},
    };
    use std::sync::Arc;

    fn local(dialect: ShellDialect) -> ShellControl {
        ShellControl::new(
            SessionRegistry::new(),
            Arc::new(LocalProvider::new(RuntimeConfig::default())),
            ShellSettings::default(),
            Some(dialect),
        )
    }

    #[cfg(unix)]
    #[test]
    fn test_restricted_dialect_is_rejected_without_commands() {
        // --- Setup ---
        let mut shell = local(ShellDialect::Restricted);

        // --- Execute ---
        let err = ConnectionFileSystem::new(&mut shell).open().unwrap_err();

        // --- Assert ---
        assert!(matches!(err, ShellError::NoInteraction(_)));
        assert!(err.is_expected());
        assert_eq!(shell.dispatched_commands(), 0);
        assert_eq!(shell.state(), SessionState::Closed);
    }

    #[cfg(unix)]
    #[test]
    fn test_denied_file_system_gate() {
        let mut shell = ShellControl::new(
            SessionRegistry::new(),
            Arc::new(LocalProvider::new(RuntimeConfig::default())),
            ShellSettings::default().with_gate(crate::system::provider::DenyAccess::new(
                Access::FileSystem,
                "file access disabled",
            )),
            Some(ShellDialect::Sh),
        );

        let err = ConnectionFileSystem::new(&mut shell).open().unwrap_err();

        assert!(matches!(err, ShellError::GateDenied { access: Access::FileSystem, .. }));
        // Only the file system was denied.
        assert_eq!(shell.execute_simple_command("echo ok").unwrap(), "ok");
        shell.kill();
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_accessible_restores_working_directory() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        let root = FilePath::of(dir.path().to_string_lossy().into_owned());
        let mut shell = local(ShellDialect::Sh);
        let mut fs = ConnectionFileSystem::new(&mut shell);
        fs.open().unwrap();
        let before = fs.shell().working_directory().unwrap();

        // --- Execute ---
        let accessible = fs.directory_accessible(&root).unwrap();
        let missing = fs.directory_accessible(&root.join("missing")).unwrap();

        // --- Assert ---
        assert!(accessible);
        assert!(!missing);
        assert_eq!(fs.shell().working_directory().unwrap(), before);
        fs.close();
    }
}
