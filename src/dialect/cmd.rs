// src/dialect/cmd.rs

use super::{CommandTemplates, DialectSpec, normalize_newlines, reject_nul};
use crate::{
    core::command_builder::CommandBuilder,
    dialect::ShellDialect,
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
    identify: None,
    make_executable,
    write_lines,
    askpass,
    prepare_script,
    noop: "(call )",
    exit: "exit",
};

// `(call )` sets errorlevel 0 and `(call)` sets 1 without leaving the shell the way
// `exit /b` would.
const TRUE: &str = "((call ))";
const FALSE: &str = "((call))";

fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '\\' | ':')
}

/// Double-quotes `argument`. Inside quotes `& | < > ^ ( )` lose their meaning; an
/// embedded quote is doubled.
fn quote(argument: &str) -> Result<String, ShellError> {
    reject_nul(argument)?;
    if !argument.is_empty() && argument.chars().all(is_safe) {
        return Ok(argument.to_string());
    }
    Ok(format!("\"{}\"", argument.replace('"', "\"\"")))
}

fn split(line: &str) -> Result<Vec<String>, ShellError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    quoted = false;
                }
            } else {
                current.push(c);
            }
            continue;
        }
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '"' => {
                quoted = true;
                in_word = true;
            }
            '^' => {
                in_word = true;
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }
    if quoted {
        return Err(ShellError::InvalidArgument(format!("unbalanced quoting in '{}'", line)));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Each line is parsed (and its `%variables%` expanded) only when it is reached, so
/// the exit code is saved on its own line before being printed.
fn frame(command: &str, marker: &FrameMarker, separate_stderr: bool) -> String {
    let (b, e) = (marker.begin(), marker.end());
    let mut out = String::from("(call )");
    if separate_stderr {
        out.push_str(&format!("& >&2 echo {}", b));
    }
    out.push_str(&format!("& echo {}\r\n", b));
    out.push_str(command);
    out.push_str("\r\nset __shellctl_rc=%errorlevel%\r\n");
    out.push_str("echo.");
    if separate_stderr {
        out.push_str("& >&2 echo.");
    }
    out.push_str(&format!("& echo {}:%__shellctl_rc%", e));
    if separate_stderr {
        out.push_str(&format!("& >&2 echo {}", e));
    }
    out.push_str("\r\n");
    out
}

/// Runs `then` when `path` is a directory and `otherwise` when it is not.
/// `%~aI` expands to the attribute string, which starts with `d` for directories.
fn if_directory(path: &FilePath, then: &str, otherwise: &str) -> CommandBuilder {
    CommandBuilder::of()
        .add("for %I in (")
        .add_file(path.clone())
        .add(format!(") do @if \"%~aI\" GEQ \"d\" ({}) else ({})", then, otherwise))
}

// --- FILE OPERATIONS ---

fn file_read(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of().add("type").add_file(path.clone()))
}

fn stream_write(_path: &FilePath, _size: u64) -> Result<CommandBuilder, ShellError> {
    Err(ShellError::unsupported(ShellDialect::Cmd, "stream file writes"))
}

fn file_exists(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("if exist")
        .add_file(path.clone())
        .add(format!("{} else {}", TRUE, FALSE)))
}

fn delete(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    let quoted = quote(path.as_str())?;
    Ok(if_directory(
        path,
        &format!("rmdir /S /Q {}", quoted),
        &format!("if exist {} del /F /Q {}", quoted, quoted),
    ))
}

fn copy(from: &FilePath, to: &FilePath) -> Result<CommandBuilder, ShellError> {
    let (src, dst) = (quote(from.as_str())?, quote(to.as_str())?);
    Ok(if_directory(
        from,
        &format!("xcopy {} {} /E /I /H /Y /Q >NUL", src, dst),
        &format!("copy /Y {} {} >NUL", src, dst),
    ))
}

fn move_to(from: &FilePath, to: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("move /Y")
        .add_files([from.clone(), to.clone()])
        .add(">NUL"))
}

fn mkdirs(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("if not exist")
        .add_file(path.clone())
        .add("mkdir")
        .add_file(path.clone()))
}

fn touch(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("if not exist")
        .add_file(path.clone())
        .add("(type NUL >")
        .add_file(path.clone())
        .add(")"))
}

fn symlink(link: &FilePath, target: &FilePath) -> Result<CommandBuilder, ShellError> {
    let (l, t) = (quote(link.as_str())?, quote(target.as_str())?);
    Ok(if_directory(
        target,
        &format!("mklink /D {} {} >NUL", l, t),
        &format!("mklink {} {} >NUL", l, t),
    ))
}

fn directory_exists(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(if_directory(path, "(call )", "(call)"))
}

fn list_files(dir: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("pushd")
        .add_file(dir.clone())
        .add(concat!(
            "&& ((for /F \"delims=\" %I in ('dir /B /A:D 2^>NUL') do @echo d\t0\t%I)",
            " & (for /F \"delims=\" %I in ('dir /B /A:-D 2^>NUL') do @echo f\t%~zI\t%I)",
            " & popd)"
        )))
}

fn list_roots() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string(
        "for %D in (A B C D E F G H I J K L M N O P Q R S T U V W X Y Z) do @if exist %D:\\ echo %D:\\",
    ))
}

fn file_size(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("if exist")
        .add_file(path.clone())
        .add("(for %I in (")
        .add_file(path.clone())
        .add(format!(") do @echo %~zI) else {}", FALSE)))
}

// --- SESSION COMMANDS ---

fn get_env(name: &str) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string(format!(
        "if defined {} (echo %{}%)",
        name, name
    )))
}

/// Escapes the characters that cmd interprets on a command line. `%` cannot be
/// escaped outside of batch files and is passed through.
fn caret_escape(value: &str) -> String {
    value
        .replace('^', "^^")
        .replace('&', "^&")
        .replace('<', "^<")
        .replace('>', "^>")
        .replace('|', "^|")
}

fn with_env(env: &[(String, String)], command: &str) -> Result<String, ShellError> {
    let mut out = String::new();
    for (k, v) in env {
        reject_nul(v)?;
        out.push_str(&format!("set {}={}& ", k, caret_escape(v)));
    }
    out.push_str(command);
    Ok(out)
}

fn cd(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of().add("cd /D").add_file(path.clone()))
}

fn pwd() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string("cd"))
}

fn which(name: &str) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("where")
        .add_quoted(name)
        .add(">NUL 2>NUL"))
}

fn process_exists(pid: u32) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string(format!(
        "tasklist /FI \"PID eq {}\" /NH | find \" {} \" >NUL",
        pid, pid
    )))
}

fn temp_dir() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string("echo %TEMP%"))
}

fn os_probe() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string("echo %OS%"))
}

/// cmd cannot tell whether it is attached to a console.
fn tty_probe() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string("echo :"))
}

fn make_executable(_path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string("(call )"))
}

fn write_lines(_path: &FilePath, _content: &str) -> Result<CommandBuilder, ShellError> {
    Err(ShellError::unsupported(ShellDialect::Cmd, "line writes"))
}

// --- SCRIPTS ---

/// Escapes a value for a batch file line, where `%` must be doubled as well.
fn escape_for_cmd_set(value: &str) -> String {
    value
        .replace('%', "%%") // Percent signs
        .replace('^', "^^") // Carets (the escape character itself)
        .replace('&', "^&") // Command separator
        .replace('<', "^<") // Redirection
        .replace('>', "^>") // Redirection
        .replace('|', "^|") // Pipes
}

fn askpass(secrets: &[SecretValue]) -> Result<String, ShellError> {
    let mut script = String::from("@echo off\r\nsetlocal\r\n");
    script.push_str("set \"count_file=%~f0.count\"\r\n");
    script.push_str("set n=0\r\n");
    script.push_str("if exist \"%count_file%\" set /p n=<\"%count_file%\"\r\n");
    script.push_str("set /a next=n+1\r\n");
    script.push_str("(echo %next%)>\"%count_file%\"\r\n");
    for i in 0..secrets.len() {
        script.push_str(&format!("if \"%n%\"==\"{}\" goto secret{}\r\n", i, i));
    }
    script.push_str("exit /b 1\r\n");
    for (i, secret) in secrets.iter().enumerate() {
        let value = secret.secret_value();
        reject_nul(value)?;
        if value.contains(['\r', '\n']) {
            return Err(ShellError::InvalidArgument(
                "askpass secrets cannot span multiple lines".to_string(),
            ));
        }
        script.push_str(&format!(
            ":secret{}\r\necho({}\r\nexit /b 0\r\n",
            i,
            escape_for_cmd_set(value)
        ));
    }
    Ok(script)
}

fn prepare_script(spec: &DialectSpec, content: &str) -> String {
    let body = normalize_newlines(content, spec.script_newline);
    if body.trim_start().to_ascii_lowercase().starts_with("@echo off") {
        body
    } else {
        format!("@echo off{}{}", spec.script_newline, body)
    }
}
