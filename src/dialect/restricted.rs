// src/dialect/restricted.rs

//! Appliance shells (network gear, locked-down consoles) that accept a login but
//! cannot run our commands. Every template fails.

use super::{CommandTemplates, DialectSpec, posix};
use crate::{
    core::command_builder::CommandBuilder,
    dialect::ShellDialect,
    models::SecretValue,
    system::{error::ShellError, framing::FrameMarker},
};

pub(crate) const TEMPLATES: CommandTemplates = CommandTemplates {
    quote,
    split: posix::split,
    frame,
    file_read: |_| unsupported("file reads"),
    stream_write: |_, _| unsupported("stream file writes"),
    file_exists: |_| unsupported("existence checks"),
    delete: |_| unsupported("deleting files"),
    copy: |_, _| unsupported("copying files"),
    move_to: |_, _| unsupported("moving files"),
    mkdirs: |_| unsupported("creating directories"),
    touch: |_| unsupported("touching files"),
    symlink: |_, _| unsupported("symbolic links"),
    directory_exists: |_| unsupported("directory checks"),
    list_files: |_| unsupported("listing files"),
    list_roots: || unsupported("listing roots"),
    file_size: |_| unsupported("file sizes"),
    get_env: |_| unsupported("environment variables"),
    with_env: |_, _| Err(ShellError::unsupported(ShellDialect::Restricted, "environment variables")),
    cd: |_| unsupported("changing directories"),
    pwd: || unsupported("working directories"),
    which: |_| unsupported("executable lookup"),
    process_exists: |_| unsupported("process checks"),
    temp_dir: || unsupported("temporary directories"),
    os_probe: || unsupported("OS detection"),
    tty_probe: || unsupported("terminal detection"),
    identify: None,
    make_executable: |_| unsupported("file permissions"),
    write_lines: |_, _| unsupported("file writes"),
    askpass,
    prepare_script,
    noop: "",
    exit: "exit",
};

fn unsupported(operation: &'static str) -> Result<CommandBuilder, ShellError> {
    Err(ShellError::unsupported(ShellDialect::Restricted, operation))
}

fn quote(_argument: &str) -> Result<String, ShellError> {
    Err(ShellError::unsupported(ShellDialect::Restricted, "argument quoting"))
}

/// Never sent: sessions refuse to dispatch anything to a restricted shell.
fn frame(command: &str, _marker: &FrameMarker, _separate_stderr: bool) -> String {
    command.to_string()
}

fn askpass(_secrets: &[SecretValue]) -> Result<String, ShellError> {
    Err(ShellError::unsupported(ShellDialect::Restricted, "askpass scripts"))
}

fn prepare_script(_spec: &DialectSpec, content: &str) -> String {
    content.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilePath;

    #[test]
    fn test_every_file_template_is_unsupported() {
        let p = FilePath::of("/x");
        let t = &TEMPLATES;
        let results = [
            (t.file_read)(&p),
            (t.stream_write)(&p, 1),
            (t.file_exists)(&p),
            (t.delete)(&p),
            (t.copy)(&p, &p),
            (t.move_to)(&p, &p),
            (t.mkdirs)(&p),
            (t.touch)(&p),
            (t.symlink)(&p, &p),
            (t.directory_exists)(&p),
            (t.list_files)(&p),
            (t.list_roots)(),
            (t.file_size)(&p),
        ];
        for result in results {
            let err = result.unwrap_err();
            assert!(matches!(
                err,
                ShellError::Unsupported {
                    dialect: ShellDialect::Restricted,
                    ..
                }
            ));
        }
    }
}
