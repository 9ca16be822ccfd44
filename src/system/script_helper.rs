// src/system/script_helper.rs

//! Script files written to a shell's temporary directory.

use crate::{
    constants::SCRIPT_PREFIX,
    core::cache::content_hash,
    dialect::{DialectFamily, ShellDialect},
    models::{FilePath, OsType, SecretValue},
    system::{error::ShellError, filesystem::ConnectionFileSystem, shell::ShellControl},
};
use log::debug;
use uuid::Uuid;

/// Writes `content` as an executable script for the session's dialect.
///
/// The file is named after a hash of its prepared content, so the same script is
/// written only once per temporary directory.
pub fn create_exec_script(shell: &mut ShellControl, content: &str) -> Result<FilePath, ShellError> {
    let dialect = shell.dialect();
    let prepared = dialect.prepare_script_content(content);
    let name = format!(
        "{}{}.{}",
        SCRIPT_PREFIX,
        content_hash(prepared.as_bytes()),
        dialect.script_extension()
    );
    let path = shell.system_temporary_directory()?.join(&name);

    let mut fs = ConnectionFileSystem::new(shell);
    if fs.file_exists(&path)? {
        debug!("Reusing script {}", path);
        return Ok(path);
    }
    write_executable(&mut fs, dialect, &path, &prepared)?;
    debug!("Created script {}", path);
    Ok(path)
}

/// Writes a script that prints `secrets` one per invocation, for programs that ask for
/// credentials through an askpass helper.
///
/// PowerShell and fish scripts cannot serve as askpass helpers, so those sessions get a
/// `cmd` (Windows) or `sh` script instead. It is written through the command text, since
/// nothing streamed after a command reliably reaches a helper layered on those shells.
pub fn create_askpass_script(shell: &mut ShellControl, secrets: &[SecretValue]) -> Result<FilePath, ShellError> {
    shell.start()?;
    let writer = shell.dialect();
    let (script_dialect, streamed) = match writer.family() {
        DialectFamily::PowerShell | DialectFamily::Fish => {
            let helper = if shell.os_type() == OsType::Windows {
                ShellDialect::Cmd
            } else {
                ShellDialect::Sh
            };
            (helper, false)
        }
        _ => (writer, true),
    };

    let content = script_dialect.askpass_fixed_content(secrets)?;
    let prepared = script_dialect.prepare_script_content(&content);
    let name = format!(
        "{}askpass-{}.{}",
        SCRIPT_PREFIX,
        Uuid::new_v4().simple(),
        script_dialect.script_extension()
    );
    let path = shell.system_temporary_directory()?.join(&name);

    let mut fs = ConnectionFileSystem::new(shell);
    if streamed {
        write_executable(&mut fs, writer, &path, &prepared)?;
    } else {
        fs.open()?;
        let command = writer.write_lines_command(&path, &prepared)?;
        fs.shell().discard_or_throw(command)?;
        let command = writer.make_executable_command(&path)?;
        fs.shell().discard_or_throw(command)?;
    }
    debug!(
        "Created {} askpass script {} for {} secret(s)",
        script_dialect,
        path,
        secrets.len()
    );
    Ok(path)
}

fn write_executable(
    fs: &mut ConnectionFileSystem<'_>,
    dialect: ShellDialect,
    path: &FilePath,
    prepared: &str,
) -> Result<(), ShellError> {
    fs.write_all(path, prepared.as_bytes())?;
    let command = dialect.make_executable_command(path)?;
    fs.shell().discard_or_throw(command)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::{
        core::registry::SessionRegistry,
        system::{provider::LocalProvider, shell::ShellSettings, shells_config::RuntimeConfig},
    };
    use std::{process::Command, sync::Arc};

    fn local(dialect: ShellDialect) -> ShellControl {
        ShellControl::new(
            SessionRegistry::new(),
            Arc::new(LocalProvider::new(RuntimeConfig::default())),
            ShellSettings::default(),
            Some(dialect),
        )
    }

    fn sh() -> ShellControl {
        local(ShellDialect::Sh)
    }

    #[test]
    fn test_exec_script_is_written_once_and_runs() {
        // --- Setup ---
        let mut shell = sh();
        let marker = Uuid::new_v4().simple().to_string();
        let content = format!("echo {}", marker);

        // --- Execute ---
        let first = create_exec_script(&mut shell, &content).unwrap();
        let second = create_exec_script(&mut shell, &content).unwrap();
        let output = shell.execute_simple_command(first.as_str()).unwrap();

        // --- Assert ---
        assert_eq!(first, second);
        assert!(first.file_name().unwrap().starts_with(SCRIPT_PREFIX));
        assert!(first.as_str().ends_with(".sh"));
        assert_eq!(output, marker);
        std::fs::remove_file(first.as_str()).ok();
        shell.kill();
    }

    #[test]
    fn test_askpass_script_answers_in_order() {
        // --- Setup ---
        let mut shell = sh();
        let secrets = [SecretValue::new("first pass"), SecretValue::new("it's second")];

        // --- Execute ---
        let path = create_askpass_script(&mut shell, &secrets).unwrap();
        let run = || Command::new(path.as_str()).output().unwrap();
        let (a, b, c) = (run(), run(), run());

        // --- Assert ---
        assert_eq!(String::from_utf8_lossy(&a.stdout), "first pass\n");
        assert_eq!(String::from_utf8_lossy(&b.stdout), "it's second\n");
        assert!(!c.status.success());
        std::fs::remove_file(path.as_str()).ok();
        std::fs::remove_file(format!("{}.count", path)).ok();
        shell.kill();
    }

    #[test]
    fn test_write_lines_command_reproduces_content() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        let path = FilePath::of(dir.path().join("lines.txt").to_string_lossy().into_owned());
        let content = "first line\n\n%s and 'quotes' \\n\n";
        let mut shell = sh();

        // --- Execute ---
        let command = ShellDialect::Sh.write_lines_command(&path, content).unwrap();
        shell.discard_or_throw(command).unwrap();

        // --- Assert ---
        assert_eq!(std::fs::read_to_string(path.as_str()).unwrap(), content);
        shell.kill();
    }

    #[test]
    fn test_askpass_script_for_fish_session_is_sh() {
        // --- Setup ---
        if !sh().is_application_in_path("fish").unwrap() {
            return;
        }
        let mut shell = local(ShellDialect::Fish);
        let secrets = [SecretValue::new("fish pass")];

        // --- Execute ---
        let path = create_askpass_script(&mut shell, &secrets).unwrap();
        let output = Command::new(path.as_str()).output().unwrap();

        // --- Assert ---
        assert!(path.as_str().ends_with(".sh"));
        assert_eq!(String::from_utf8_lossy(&output.stdout), "fish pass\n");
        // The session is still in sync after the helper was written.
        assert_eq!(shell.execute_simple_command("echo ok").unwrap(), "ok");
        std::fs::remove_file(path.as_str()).ok();
        std::fs::remove_file(format!("{}.count", path)).ok();
        shell.kill();
    }
}
