// src/dialect/posix.rs

use super::{CommandTemplates, DialectSpec, normalize_newlines, reject_nul};
use crate::{
    core::command_builder::CommandBuilder,
    models::{FilePath, SecretValue},
    system::{error::ShellError, framing::FrameMarker},
};

pub(crate) const TEMPLATES: CommandTemplates = CommandTemplates {
    quote,
    split,
    frame,
    file_read,
    stream_write,
    file_exists,
    delete,
    copy,
    move_to,
    mkdirs,
    touch,
    symlink,
    directory_exists,
    list_files,
    list_roots,
    file_size,
    get_env,
    with_env,
    cd,
    pwd,
    which,
    process_exists,
    temp_dir,
    os_probe,
    tty_probe,
    identify: Some(identify),
    make_executable,
    write_lines,
    askpass,
    prepare_script,
    noop: ":",
    exit: "exit",
};

/// Characters that never need quoting in any POSIX shell, even at the start of a word.
fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | ',' | '+' | '@' | '%')
}

/// Single-quotes `argument`, writing embedded quotes as `'\''`.
pub(crate) fn quote(argument: &str) -> Result<String, ShellError> {
    reject_nul(argument)?;
    if !argument.is_empty() && argument.chars().all(is_safe) {
        return Ok(argument.to_string());
    }
    Ok(format!("'{}'", argument.replace('\'', "'\\''")))
}

pub(crate) fn split(line: &str) -> Result<Vec<String>, ShellError> {
    shlex::split(line)
        .ok_or_else(|| ShellError::InvalidArgument(format!("unbalanced quoting in '{}'", line)))
}

/// The command runs inside a `{ }` group so the shell reads the whole frame before
/// executing it. Stream writes rely on that: their payload follows the frame on stdin.
fn frame(command: &str, marker: &FrameMarker, separate_stderr: bool) -> String {
    let (b, e) = (marker.begin(), marker.end());
    let mut out = format!("printf '%s\\n' '{}'", b);
    if separate_stderr {
        out.push_str(&format!("; printf '%s\\n' '{}' >&2", b));
    }
    out.push_str(&format!(
        "\n{{ {}\n}}; __shellctl_rc=$?; printf '\\n%s:%s\\n' '{}' \"$__shellctl_rc\"",
        command, e
    ));
    if separate_stderr {
        out.push_str(&format!("; printf '\\n%s\\n' '{}' >&2", e));
    }
    out.push('\n');
    out
}

// --- FILE OPERATIONS ---

pub(crate) fn file_read(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of().add("cat --").add_file(path.clone()))
}

pub(crate) fn stream_write(path: &FilePath, size: u64) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add(format!("head -c {} >", size))
        .add_file(path.clone()))
}

pub(crate) fn file_exists(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("test -e")
        .add_file(path.clone())
        .add("|| test -L")
        .add_file(path.clone()))
}

pub(crate) fn delete(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of().add("rm -rf --").add_file(path.clone()))
}

pub(crate) fn copy(from: &FilePath, to: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("cp -pR --")
        .add_files([from.clone(), to.clone()]))
}

pub(crate) fn move_to(from: &FilePath, to: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("mv -f --")
        .add_files([from.clone(), to.clone()]))
}

pub(crate) fn mkdirs(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of().add("mkdir -p --").add_file(path.clone()))
}

pub(crate) fn touch(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of().add("touch --").add_file(path.clone()))
}

pub(crate) fn symlink(link: &FilePath, target: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("ln -s --")
        .add_files([target.clone(), link.clone()]))
}

pub(crate) fn directory_exists(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of().add("test -d").add_file(path.clone()))
}

/// Body of the listing loop. Expects to run inside the listed directory.
pub(crate) const LIST_LOOP: &str = concat!(
    "for f in * .[!.]* ..?*; do ",
    "if [ -L \"$f\" ]; then t=l; elif [ -d \"$f\" ]; then t=d; elif [ -e \"$f\" ]; then t=f; else continue; fi; ",
    "s=0; if [ \"$t\" = f ]; then s=$(wc -c 2>/dev/null < \"$f\" | tr -d ' '); fi; ",
    "printf '%s\\t%s\\t%s\\n' \"$t\" \"${s:-0}\" \"$f\"; ",
    "done"
);

fn list_files(dir: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("( cd --")
        .add_file(dir.clone())
        .add(format!("&& {} )", LIST_LOOP)))
}

pub(crate) fn list_roots() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string("printf '%s\\n' /"))
}

pub(crate) fn file_size(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of().add("wc -c <").add_file(path.clone()))
}

// --- SESSION COMMANDS ---

fn get_env(name: &str) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string(format!("printf '%s' \"${{{}}}\"", name)))
}

fn with_env(env: &[(String, String)], command: &str) -> Result<String, ShellError> {
    let assignments = env
        .iter()
        .map(|(k, v)| Ok(format!("{}={}", k, quote(v)?)))
        .collect::<Result<Vec<_>, ShellError>>()?;
    Ok(format!("(export {}; {})", assignments.join(" "), command))
}

pub(crate) fn cd(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of().add("cd --").add_file(path.clone()))
}

pub(crate) fn pwd() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string("pwd"))
}

/// `command -v` exits 127 in dash when nothing is found, so the result is normalized.
fn which(name: &str) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("if command -v")
        .add_quoted(name)
        .add(">/dev/null 2>&1; then true; else false; fi"))
}

pub(crate) fn process_exists(pid: u32) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string(format!("kill -0 {} 2>/dev/null", pid)))
}

fn temp_dir() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string("printf '%s' \"${TMPDIR:-/tmp}\""))
}

pub(crate) fn os_probe() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string("uname -s"))
}

fn tty_probe() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string(
        "if [ -t 0 ]; then printf in; fi; printf ':'; if [ -t 1 ]; then printf out; fi",
    ))
}

fn identify() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string(
        "if [ -n \"$ZSH_VERSION\" ]; then printf zsh; elif [ -n \"$BASH_VERSION\" ]; then printf bash; else printf sh; fi",
    ))
}

pub(crate) fn make_executable(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of().add("chmod +x --").add_file(path.clone()))
}

/// `printf` repeats its format for every argument, so every line gets its own break.
pub(crate) fn write_lines(path: &FilePath, content: &str) -> Result<CommandBuilder, ShellError> {
    if content.is_empty() {
        return Ok(CommandBuilder::of().add("printf '' >").add_file(path.clone()));
    }
    let command = content
        .lines()
        .fold(CommandBuilder::of().add("printf '%s\\n'"), |command, line| {
            command.add_quoted(line)
        });
    Ok(command.add(">").add_file(path.clone()))
}

// --- SCRIPTS ---

/// Answers the n-th invocation with the n-th secret. The invocation count is kept in
/// a file next to the script.
pub(crate) fn askpass(secrets: &[SecretValue]) -> Result<String, ShellError> {
    let mut script = String::from("#!/bin/sh\n");
    script.push_str("count_file=\"$0.count\"\n");
    script.push_str("n=$(cat \"$count_file\" 2>/dev/null || echo 0)\n");
    script.push_str("echo $((n + 1)) > \"$count_file\"\n");
    script.push_str("case \"$n\" in\n");
    for (i, secret) in secrets.iter().enumerate() {
        script.push_str(&format!(
            "  {}) printf '%s\\n' {} ;;\n",
            i,
            quote(secret.secret_value())?
        ));
    }
    script.push_str("  *) exit 1 ;;\nesac\n");
    Ok(script)
}

pub(crate) fn prepare_script(spec: &DialectSpec, content: &str) -> String {
    let body = normalize_newlines(content, spec.script_newline);
    match spec.shebang {
        Some(shebang) if !body.starts_with("#!") => format!("{}{}{}", shebang, spec.script_newline, body),
        _ => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_lines_passes_each_line_as_argument() {
        let ctx = crate::core::command_builder::ExecutionContext::new(crate::dialect::ShellDialect::Sh);
        let path = FilePath::of("/tmp/x y");

        let rendered = write_lines(&path, "a b\n\nc'd\n").unwrap().build(&ctx).unwrap();
        let empty = write_lines(&path, "").unwrap().build(&ctx).unwrap();

        assert_eq!(rendered, "printf '%s\\n' 'a b' '' 'c'\\''d' > '/tmp/x y'");
        assert_eq!(empty, "printf '' > '/tmp/x y'");
    }

    #[test]
    fn test_quote_leaves_safe_words_bare() {
        assert_eq!(quote("/usr/bin/env").unwrap(), "/usr/bin/env");
        assert_eq!(quote("").unwrap(), "''");
        assert_eq!(quote("$HOME").unwrap(), "'$HOME'");
        assert_eq!(quote("a'b").unwrap(), "'a'\\''b'");
        assert!(quote("a\0b").is_err());
    }

    #[test]
    fn test_split_inverts_quote() {
        let nasty = "it's a \"test\" with $vars, `ticks` and \\slashes\\";
        let line = format!("echo {} {}", quote(nasty).unwrap(), quote("plain").unwrap());
        assert_eq!(split(&line).unwrap(), vec!["echo", nasty, "plain"]);
    }

    #[test]
    fn test_askpass_lists_every_secret_in_order() {
        let script = askpass(&[SecretValue::new("first pw"), SecretValue::new("o'ther")]).unwrap();
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("  0) printf '%s\\n' 'first pw' ;;\n"));
        assert!(script.contains("  1) printf '%s\\n' 'o'\\''ther' ;;\n"));
        assert!(script.ends_with("  *) exit 1 ;;\nesac\n"));
    }

    #[test]
    fn test_frame_runs_command_in_group() {
        let marker = FrameMarker::new();
        let framed = frame("echo hi", &marker, true);
        let lines: Vec<&str> = framed.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "{ echo hi");
        assert!(lines[2].starts_with("}; __shellctl_rc=$?;"));
    }
}
