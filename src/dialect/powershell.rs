// src/dialect/powershell.rs

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
    noop: "$null",
    exit: "exit",
};

/// PowerShell accepts the typographic single quotes as string delimiters too.
fn is_single_quote(c: char) -> bool {
    matches!(c, '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}')
}

/// Always produces a single-quoted literal. A bare word would be parsed as a command
/// name or an operator in expression position.
fn quote(argument: &str) -> Result<String, ShellError> {
    reject_nul(argument)?;
    let mut out = String::with_capacity(argument.len() + 2);
    out.push('\'');
    for c in argument.chars() {
        if is_single_quote(c) {
            out.push(c);
        }
        out.push(c);
    }
    out.push('\'');
    Ok(out)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Bare,
    Single,
    Double,
}

fn split(line: &str) -> Result<Vec<String>, ShellError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut mode = Mode::Bare;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match mode {
            Mode::Bare => {
                if c.is_whitespace() {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                    continue;
                }
                in_word = true;
                if is_single_quote(c) {
                    mode = Mode::Single;
                } else if c == '"' {
                    mode = Mode::Double;
                } else if c == '`' {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                } else {
                    current.push(c);
                }
            }
            Mode::Single => {
                if is_single_quote(c) {
                    match chars.peek() {
                        Some(&next) if is_single_quote(next) => {
                            current.push(next);
                            chars.next();
                        }
                        _ => mode = Mode::Bare,
                    }
                } else {
                    current.push(c);
                }
            }
            Mode::Double => match c {
                '`' => {
                    if let Some(next) = chars.next() {
                        current.push(match next {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            '0' => '\0',
                            other => other,
                        });
                    }
                }
                '"' if chars.peek() == Some(&'"') => {
                    current.push('"');
                    chars.next();
                }
                '"' => mode = Mode::Bare,
                other => current.push(other),
            },
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

/// Single-line frame: `-Command -` executes each line as soon as it is read, and the
/// stream reader may buffer beyond the line it returns.
fn frame(command: &str, marker: &FrameMarker, separate_stderr: bool) -> String {
    let (b, e) = (marker.begin(), marker.end());
    let mut out = format!("[Console]::Out.Write(\"{}`n\"); ", b);
    if separate_stderr {
        out.push_str(&format!("[Console]::Error.Write(\"{}`n\"); ", b));
    }
    out.push_str(concat!(
        "$global:LASTEXITCODE = $null; $global:__shellctl_err = $false; ",
        "trap { $global:__shellctl_err = $true; [Console]::Error.WriteLine($_); continue }; "
    ));
    out.push_str(command);
    out.push_str(concat!(
        "; $__shellctl_rc = if ($? -and -not $global:__shellctl_err) { 0 } else { 2 }; ",
        "if ($LASTEXITCODE) { $__shellctl_rc = $LASTEXITCODE }; "
    ));
    out.push_str(&format!("[Console]::Out.Write(\"`n{}:$__shellctl_rc`n\")", e));
    if separate_stderr {
        out.push_str(&format!("; [Console]::Error.Write(\"`n{}`n\")", e));
    }
    out.push('\n');
    out
}

/// Check commands report through `$LASTEXITCODE`. Calling `exit` would end the session.
fn check(condition: CommandBuilder) -> CommandBuilder {
    CommandBuilder::of()
        .add("if (")
        .add_all(condition)
        .add(") { $global:LASTEXITCODE = 0 } else { $global:LASTEXITCODE = 1 }")
}

fn resolved(path: &FilePath) -> CommandBuilder {
    CommandBuilder::of()
        .add("$ExecutionContext.SessionState.Path.GetUnresolvedProviderPathFromPSPath(")
        .add_file(path.clone())
        .add(")")
}

// --- FILE OPERATIONS ---

fn file_read(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("$__f = (Get-Item -LiteralPath")
        .add_file(path.clone())
        .add(concat!(
            "-Force ).OpenRead(); $__o = [Console]::OpenStandardOutput(); ",
            "try { $__f.CopyTo($__o); $__o.Flush() } finally { $__f.Close() }"
        )))
}

fn stream_write(path: &FilePath, size: u64) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("$__p =")
        .add_all(resolved(path))
        .add(format!(
            concat!(
                "; $__i = [Console]::OpenStandardInput(); $__o = [IO.File]::Create($__p); ",
                "try {{ $__b = New-Object byte[] 65536; $__n = [long]{}; while ($__n -gt 0) {{ ",
                "$__r = $__i.Read($__b, 0, [int][Math]::Min($__b.Length, $__n)); if ($__r -le 0) {{ break }}; ",
                "$__o.Write($__b, 0, $__r); $__n -= $__r }} }} finally {{ $__o.Close() }}"
            ),
            size
        )))
}

fn file_exists(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(check(
        CommandBuilder::of().add("Test-Path -LiteralPath").add_file(path.clone()),
    ))
}

fn delete(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("if (Test-Path -LiteralPath")
        .add_file(path.clone())
        .add(") { Remove-Item -LiteralPath")
        .add_file(path.clone())
        .add("-Recurse -Force }"))
}

fn copy(from: &FilePath, to: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("Copy-Item -LiteralPath")
        .add_file(from.clone())
        .add("-Destination")
        .add_file(to.clone())
        .add("-Recurse -Force"))
}

fn move_to(from: &FilePath, to: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("Move-Item -LiteralPath")
        .add_file(from.clone())
        .add("-Destination")
        .add_file(to.clone())
        .add("-Force"))
}

fn mkdirs(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("[void][IO.Directory]::CreateDirectory(")
        .add_all(resolved(path))
        .add(")"))
}

fn touch(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("$__p =")
        .add_all(resolved(path))
        .add(concat!(
            "; if ([IO.File]::Exists($__p)) { [IO.File]::SetLastWriteTime($__p, [DateTime]::Now) } ",
            "else { [IO.File]::Create($__p).Close() }"
        )))
}

fn symlink(link: &FilePath, target: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("[void](New-Item -ItemType SymbolicLink -Path")
        .add_file(link.clone())
        .add("-Target")
        .add_file(target.clone())
        .add(")"))
}

fn directory_exists(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(check(
        CommandBuilder::of()
            .add("Test-Path -LiteralPath")
            .add_file(path.clone())
            .add("-PathType Container"),
    ))
}

fn list_files(dir: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("Get-ChildItem -LiteralPath")
        .add_file(dir.clone())
        .add(concat!(
            "-Force | ForEach-Object { ",
            "$__t = if ($_.LinkType) { 'l' } elseif ($_.PSIsContainer) { 'd' } else { 'f' }; ",
            "$__s = if ($_.PSIsContainer) { 0 } else { $_.Length }; ",
            "[Console]::Out.Write(\"$__t`t$__s`t$($_.Name)`n\") }"
        )))
}

fn list_roots() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string(
        "Get-PSDrive -PSProvider FileSystem | ForEach-Object { [Console]::Out.Write(\"$($_.Root)`n\") }",
    ))
}

fn file_size(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("(Get-Item -LiteralPath")
        .add_file(path.clone())
        .add("-Force ).Length"))
}

// --- SESSION COMMANDS ---

fn get_env(name: &str) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("[Console]::Out.Write([Environment]::GetEnvironmentVariable(")
        .add_quoted(name)
        .add("))"))
}

fn with_env(env: &[(String, String)], command: &str) -> Result<String, ShellError> {
    let mut out = String::new();
    for (k, v) in env {
        out.push_str(&format!("$env:{} = {}; ", k, quote(v)?));
    }
    out.push_str(command);
    Ok(out)
}

fn cd(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of().add("Set-Location -LiteralPath").add_file(path.clone()))
}

fn pwd() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string(
        "[Console]::Out.Write((Get-Location).ProviderPath)",
    ))
}

fn which(name: &str) -> Result<CommandBuilder, ShellError> {
    Ok(check(
        CommandBuilder::of()
            .add("Get-Command -Name")
            .add_quoted(name)
            .add("-CommandType Application -ErrorAction SilentlyContinue"),
    ))
}

fn process_exists(pid: u32) -> Result<CommandBuilder, ShellError> {
    Ok(check(CommandBuilder::of_string(format!(
        "Get-Process -Id {} -ErrorAction SilentlyContinue",
        pid
    ))))
}

fn temp_dir() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string(
        "[Console]::Out.Write([IO.Path]::GetTempPath())",
    ))
}

/// `$IsWindows` only exists in PowerShell Core. Windows PowerShell leaves it `$null`.
fn os_probe() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string(
        "if ($IsWindows -eq $false) { uname -s } else { 'Windows' }",
    ))
}

fn tty_probe() -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of_string(concat!(
        "[Console]::Out.Write(@('', 'in')[[int](-not [Console]::IsInputRedirected)] + ':' + ",
        "@('', 'out')[[int](-not [Console]::IsOutputRedirected)])"
    )))
}

fn make_executable(path: &FilePath) -> Result<CommandBuilder, ShellError> {
    Ok(CommandBuilder::of()
        .add("if ($IsWindows -eq $false) { chmod +x")
        .add_file(path.clone())
        .add("}"))
}

/// Joins single-quoted lines with the content's own line break. Strings spanning several
/// lines would leave `-Command -` waiting for more input.
fn write_lines(path: &FilePath, content: &str) -> Result<CommandBuilder, ShellError> {
    let command = CommandBuilder::of()
        .add("[System.IO.File]::WriteAllText(")
        .add_file(path.clone())
        .add(",");
    if content.is_empty() {
        return Ok(command.add("'')"));
    }
    let newline = if content.contains("\r\n") { "\"`r`n\"" } else { "\"`n\"" };
    let mut lines = content.lines().peekable();
    let mut command = command.add("((@(");
    while let Some(line) = lines.next() {
        command = command.add_quoted(line);
        if lines.peek().is_some() {
            command = command.add(",");
        }
    }
    Ok(command.add(format!(") -join {}) + {}))", newline, newline)))
}

fn askpass(_secrets: &[SecretValue]) -> Result<String, ShellError> {
    Err(ShellError::unsupported(ShellDialect::PowerShell, "askpass scripts"))
}

fn prepare_script(spec: &DialectSpec, content: &str) -> String {
    normalize_newlines(content, spec.script_newline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_doubles_every_single_quote_variant() {
        assert_eq!(quote("it's").unwrap(), "'it''s'");
        assert_eq!(quote("a\u{2019}b").unwrap(), "'a\u{2019}\u{2019}b'");
        assert_eq!(quote("plain").unwrap(), "'plain'");
    }

    #[test]
    fn test_split_inverts_quote() {
        for arg in ["C:\\Program Files\\x", "it's", "\u{2018}smart\u{2019}", "$env:PATH; `x`", ""] {
            let line = format!("Remove-Item -LiteralPath {} -Force", quote(arg).unwrap());
            let words = split(&line).unwrap();
            assert_eq!(words.get(2).map(String::as_str), Some(arg), "{}", arg);
        }
    }

    #[test]
    fn test_split_double_quoted() {
        let words = split("Write-Output \"a `\"b`\" \"\"c\"\"\"").unwrap();
        assert_eq!(words, vec!["Write-Output", "a \"b\" \"c\""]);
    }

    #[test]
    fn test_write_lines_keeps_every_line_on_one_command_line() {
        let ctx = crate::core::command_builder::ExecutionContext::new(ShellDialect::PowerShellCore);
        let path = FilePath::of("/tmp/a.sh");

        let unix = write_lines(&path, "#!/bin/sh\necho it's\n").unwrap().build(&ctx).unwrap();
        let windows = write_lines(&path, "@echo off\r\nexit 1\r\n").unwrap().build(&ctx).unwrap();
        let empty = write_lines(&path, "").unwrap().build(&ctx).unwrap();

        assert_eq!(
            unix,
            "[System.IO.File]::WriteAllText( '/tmp/a.sh' , ((@( '#!/bin/sh' , 'echo it''s' ) -join \"`n\") + \"`n\"))"
        );
        assert!(windows.contains("'@echo off' , 'exit 1' ) -join \"`r`n\") + \"`r`n\""));
        assert!(!windows.contains('\r'));
        assert_eq!(empty, "[System.IO.File]::WriteAllText( '/tmp/a.sh' , '')");
    }

    #[test]
    fn test_checks_never_exit_the_session() {
        let ctx = crate::core::command_builder::ExecutionContext::new(ShellDialect::PowerShell);
        let rendered = file_exists(&FilePath::of("C:\\x")).unwrap().build(&ctx).unwrap();
        assert_eq!(
            rendered,
            "if ( Test-Path -LiteralPath 'C:\\x' ) { $global:LASTEXITCODE = 0 } else { $global:LASTEXITCODE = 1 }"
        );
        assert!(!rendered.contains("exit"));
    }
}
