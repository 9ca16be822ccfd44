// src/dialect/fish.rs

use super::{CommandTemplates, posix, reject_nul};
use crate::{
    core::command_builder::CommandBuilder,
    dialect::ShellDialect,
    models::{FilePath, SecretValue},
    system::{error::ShellError, framing::FrameMarker},
};

// File commands are plain external programs, so most of them are shared with POSIX.
pub(crate) const TEMPLATES: CommandTemplates = CommandTemplates {
    quote,
    split,
    frame,
    file_read: posix::file_read,
    stream_write: posix::stream_write,
    file_exists: posix::file_exists,
    delete: posix::delete,
    copy: posix::copy,
    move_to: posix::move_to,
    mkdirs: posix::mkdirs,
    touch: posix::touch,
    symlink: posix::symlink,
    directory_exists: posix::directory_exists,
    list_files,
    list_roots: posix::list_roots,
    file_size: posix::file_size,
    get_env,
    with_env,
    cd,
    pwd: posix::pwd,
    which,
    process_exists: posix::process_exists,
    temp_dir,
    os_probe: posix::os_probe,
    tty_probe,
    identify: None,
    make_executable: posix::make_executable,
    write_lines: posix::write_lines,
    askpass,
    prepare_script: posix::prepare_script,
    noop: "true",
    exit: "exit",
};

fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | ',' | '+' | '@')
}

/// Inside fish single quotes only `\` and `'` are special.
fn quote(argument: &str) -> Result<String, ShellError> {
    reject_nul(argument)?;
    if !argument.is_empty() && argument.chars().all(is_safe) {
        return Ok(argument.to_string());
    }
    Ok(format!(
        "'{}'",
        argument.replace('\\', "\\\\").replace('\'', "\\'")
    ))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Bare,
    Single,
    Double,
}

/// Tokenizes a fish command line into its words.
fn split(line: &str) -> Result<Vec<String>, ShellError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut mode = Mode::Bare;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (mode, c) {
            (Mode::Bare, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (Mode::Bare, '\'') => {
                mode = Mode::Single;
                in_word = true;
            }
            (Mode::Bare, '"') => {
                mode = Mode::Double;
                in_word = true;
            }
            (Mode::Bare, '\\') => {
                in_word = true;
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            (Mode::Single, '\'') | (Mode::Double, '"') => mode = Mode::Bare,
            (Mode::Single, '\\') => match chars.next() {
                Some(next @ ('\\' | '\'')) => current.push(next),
                Some(next) => {
                    current.push('\\');
                    current.push(next);
                }
                None => current.push('\\'),
            },
            (Mode::Double, '\\') => match chars.next() {
                Some(next @ ('\\' | '"' | '$')) => current.push(next),
                Some(next) => {
                    current.push('\\');
                    current.push(next);
                }
                None => current.push('\\'),
            },
            (_, c) => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if mode != Mode::Bare {
        return Err(ShellError::InvalidArgument(format!("unbalanced quoting in '{}'", line)));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn frame(command: &str, marker: &FrameMarker, separate_stderr: bool) -> String {
    let (b, e) = (marker.begin(), marker.end());
    let mut out = format!("printf '%s\\n' '{}'", b);
    if separate_stderr {
        out.push_str(&format!("; printf '%s\\n' '{}' >&2", b));
    }
    out.push_str(&format!(
        "\nbegin; {}\nend; set __shellctl_rc $status; printf '\\n%s:%s\\n' '{}' $__shellctl_rc",
        command, e
    ));
    if separate_stderr {
        out.push_str(&format!("; printf '\\n%s\\n' '{}' >&2", e));
    }
    out.push('\n');
    out
}

/// fish has no portable glob for dotfiles, so the POSIX loop runs in `sh` with the
/// directory passed as `$1`.
fn list_files(dir: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("sh -c")
        .add_quoted(format!("cd -- \"$1\" && {}", posix::LIST_LOOP))
        .add("sh")
        .add_file(dir.clone()))
}

fn get_env(name: &str) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string(format!("printf '%s' \"${}\"", name)))
}

fn with_env(env: &[(String, String)], command: &str) -> Result<String, ShellError> {
    let mut out = String::from("begin; ");
    for (k, v) in env {
        out.push_str(&format!("set -lx {} {}; ", k, quote(v)?));
    }
    out.push_str(command);
    out.push_str("; end");
    Ok(out)
}

fn cd(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of().add("cd").add_file(path.clone()))
}

fn which(name: &str) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of().add("command -q").add_quoted(name))
}

fn temp_dir() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string(
        "if set -q TMPDIR; printf '%s' $TMPDIR; else; printf '%s' /tmp; end",
    ))
}

fn tty_probe() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string(
        "if isatty stdin; printf in; end; printf ':'; if isatty stdout; printf out; end",
    ))
}

fn askpass(_secrets: &[SecretValue]) -> Result<String, ShellError> {
    Err(ShellError::unsupported(ShellDialect::Fish, "askpass scripts"))
}
