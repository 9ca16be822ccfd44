// src/dialect/mod.rs

//! # Shell Dialects
//!
//! A dialect describes one shell command language: how arguments are quoted, how a
//! command is framed on the wire, and which command implements each file operation.
//!
//! The set of dialects is closed. Every variant of [`ShellDialect`] points at a static
//! [`DialectSpec`] record, and every spec carries the [`CommandTemplates`] of its family:
//!
//! - **POSIX** (`sh`, `dash`, `bash`, `zsh`): one shared template set.
//! - **fish**: reuses most POSIX file commands, with its own quoting and control flow.
//! - **PowerShell** (Windows PowerShell and PowerShell Core).
//! - **cmd**: no stream writes.
//! - **restricted**: appliance shells that cannot run anything. Every template fails.
//!
//! Nothing in here performs I/O. Templates return a [`CommandBuilder`] or fail with
//! [`ShellError::Unsupported`] at the point of use.

mod cmd;
mod fish;
mod posix;
mod powershell;
mod restricted;

use crate::{
    core::command_builder::CommandBuilder,
    models::{FileEntry, FileKind, FilePath, OsType, SecretValue, TtyState},
    system::{error::ShellError, framing::FrameMarker},
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub(crate) type PathTemplate = fn(&FilePath) -> Result<CommandBuilder, ShellError>;
pub(crate) type PairTemplate = fn(&FilePath, &FilePath) -> Result<CommandBuilder, ShellError>;
pub(crate) type FixedTemplate = fn() -> Result<CommandBuilder, ShellError>;

/// The command-template record shared by all dialects of one family.
pub(crate) struct CommandTemplates {
    pub(crate) quote: fn(&str) -> Result<String, ShellError>,
    pub(crate) split: fn(&str) -> Result<Vec<String>, ShellError>,
    /// Wraps a command between begin and end markers. The flag tells whether stderr
    /// gets its own marker pair.
    pub(crate) frame: fn(&str, &FrameMarker, bool) -> String,
    pub(crate) file_read: PathTemplate,
    pub(crate) stream_write: fn(&FilePath, u64) -> Result<CommandBuilder, ShellError>,
    pub(crate) file_exists: PathTemplate,
    pub(crate) delete: PathTemplate,
    pub(crate) copy: PairTemplate,
    pub(crate) move_to: PairTemplate,
    pub(crate) mkdirs: PathTemplate,
    pub(crate) touch: PathTemplate,
    /// `(link, target)`
    pub(crate) symlink: PairTemplate,
    pub(crate) directory_exists: PathTemplate,
    pub(crate) list_files: PathTemplate,
    pub(crate) list_roots: FixedTemplate,
    pub(crate) file_size: PathTemplate,
    pub(crate) get_env: fn(&str) -> Result<CommandBuilder, ShellError>,
    pub(crate) with_env: fn(&[(String, String)], &str) -> Result<String, ShellError>,
    pub(crate) cd: PathTemplate,
    pub(crate) pwd: FixedTemplate,
    pub(crate) which: fn(&str) -> Result<CommandBuilder, ShellError>,
    pub(crate) process_exists: fn(u32) -> Result<CommandBuilder, ShellError>,
    pub(crate) temp_dir: FixedTemplate,
    pub(crate) os_probe: FixedTemplate,
    pub(crate) tty_probe: FixedTemplate,
    pub(crate) identify: Option<FixedTemplate>,
    pub(crate) make_executable: PathTemplate,
    /// Writes text without streaming stdin, each line followed by a line break.
    pub(crate) write_lines: fn(&FilePath, &str) -> Result<CommandBuilder, ShellError>,
    pub(crate) askpass: fn(&[SecretValue]) -> Result<String, ShellError>,
    pub(crate) prepare_script: fn(&DialectSpec, &str) -> String,
    pub(crate) noop: &'static str,
    pub(crate) exit: &'static str,
}

/// Grouping of dialects that share quoting rules and command templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectFamily {
    Posix,
    Fish,
    PowerShell,
    Cmd,
    Restricted,
}

/// Whether a shell can be driven at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumbMode {
    Interactive,
    Unsupported { reason: &'static str },
}

impl DumbMode {
    pub fn supports_any_possible_interaction(&self) -> bool {
        matches!(self, Self::Interactive)
    }

    /// Fails with an expected [`ShellError::NoInteraction`] for shells that cannot run commands.
    pub fn throw_if_unsupported(&self) -> Result<(), ShellError> {
        match self {
            Self::Interactive => Ok(()),
            Self::Unsupported { reason } => Err(ShellError::NoInteraction((*reason).to_string())),
        }
    }
}

/// Static description of one dialect.
pub struct DialectSpec {
    pub id: &'static str,
    pub display_name: &'static str,
    pub executable: &'static str,
    /// Arguments that make the executable read commands from stdin.
    pub launch_args: &'static [&'static str],
    /// Arguments preceding a one-shot command text, e.g. `-c`.
    pub inline_args: &'static [&'static str],
    pub script_extension: &'static str,
    pub shebang: Option<&'static str>,
    pub script_newline: &'static str,
    /// Line terminator the shell emits when echoing our markers.
    pub output_newline: &'static str,
    pub default_os: Option<OsType>,
    pub family: DialectFamily,
    pub dumb_mode: DumbMode,
    pub(crate) templates: &'static CommandTemplates,
}

impl fmt::Debug for DialectSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialectSpec")
            .field("id", &self.id)
            .field("family", &self.family)
            .field("dumb_mode", &self.dumb_mode)
            .finish_non_exhaustive()
    }
}

// --- DIALECT TABLE ---

const SH: DialectSpec = DialectSpec {
    id: "sh",
    display_name: "POSIX sh",
    executable: "sh",
    launch_args: &[],
    inline_args: &["-c"],
    script_extension: "sh",
    shebang: Some("#!/bin/sh"),
    script_newline: "\n",
    output_newline: "\n",
    default_os: None,
    family: DialectFamily::Posix,
    dumb_mode: DumbMode::Interactive,
    templates: &posix::TEMPLATES,
};

const DASH: DialectSpec = DialectSpec {
    id: "dash",
    display_name: "Dash",
    executable: "dash",
    shebang: Some("#!/bin/dash"),
    ..SH
};

const BASH: DialectSpec = DialectSpec {
    id: "bash",
    display_name: "Bash",
    executable: "bash",
    launch_args: &["--noprofile", "--norc"],
    inline_args: &["--noprofile", "--norc", "-c"],
    shebang: Some("#!/usr/bin/env bash"),
    ..SH
};

const ZSH: DialectSpec = DialectSpec {
    id: "zsh",
    display_name: "Zsh",
    executable: "zsh",
    launch_args: &["-f"],
    inline_args: &["-f", "-c"],
    script_extension: "zsh",
    shebang: Some("#!/usr/bin/env zsh"),
    ..SH
};

const FISH: DialectSpec = DialectSpec {
    id: "fish",
    display_name: "fish",
    executable: "fish",
    launch_args: &["--no-config", "--interactive", "--private"],
    inline_args: &["--no-config", "-c"],
    script_extension: "fish",
    shebang: Some("#!/usr/bin/env fish"),
    script_newline: "\n",
    output_newline: "\n",
    default_os: None,
    family: DialectFamily::Fish,
    dumb_mode: DumbMode::Interactive,
    templates: &fish::TEMPLATES,
};

const POWERSHELL: DialectSpec = DialectSpec {
    id: "powershell",
    display_name: "Windows PowerShell",
    executable: "powershell",
    launch_args: &["-NoProfile", "-NoLogo", "-NonInteractive", "-Command", "-"],
    inline_args: &["-NoProfile", "-NonInteractive", "-InputFormat", "None", "-Command"],
    script_extension: "ps1",
    shebang: None,
    script_newline: "\r\n",
    output_newline: "\n",
    default_os: Some(OsType::Windows),
    family: DialectFamily::PowerShell,
    dumb_mode: DumbMode::Interactive,
    templates: &powershell::TEMPLATES,
};

const PWSH: DialectSpec = DialectSpec {
    id: "pwsh",
    display_name: "PowerShell Core",
    executable: "pwsh",
    default_os: None,
    ..POWERSHELL
};

const CMD: DialectSpec = DialectSpec {
    id: "cmd",
    display_name: "cmd",
    executable: "cmd",
    launch_args: &["/D", "/Q"],
    inline_args: &["/D", "/Q", "/C"],
    script_extension: "bat",
    shebang: None,
    script_newline: "\r\n",
    output_newline: "\r\n",
    default_os: Some(OsType::Windows),
    family: DialectFamily::Cmd,
    dumb_mode: DumbMode::Interactive,
    templates: &cmd::TEMPLATES,
};

const RESTRICTED: DialectSpec = DialectSpec {
    id: "restricted",
    display_name: "Restricted shell",
    executable: "sh",
    launch_args: &[],
    inline_args: &[],
    script_extension: "sh",
    shebang: None,
    script_newline: "\n",
    output_newline: "\n",
    default_os: None,
    family: DialectFamily::Restricted,
    dumb_mode: DumbMode::Unsupported {
        reason: "Shell does not support any command execution. It is a restricted appliance shell.",
    },
    templates: &restricted::TEMPLATES,
};

/// One shell command language.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellDialect {
    #[serde(rename = "sh")]
    Sh,
    #[serde(rename = "dash")]
    Dash,
    #[serde(rename = "bash")]
    Bash,
    #[serde(rename = "zsh")]
    Zsh,
    #[serde(rename = "fish")]
    Fish,
    #[serde(rename = "powershell")]
    PowerShell,
    #[serde(rename = "pwsh")]
    PowerShellCore,
    #[serde(rename = "cmd")]
    Cmd,
    #[serde(rename = "restricted")]
    Restricted,
}

/// A file operation together with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOperation {
    Read(FilePath),
    Write { path: FilePath, size: u64 },
    Exists(FilePath),
    Delete(FilePath),
    Copy { from: FilePath, to: FilePath },
    Move { from: FilePath, to: FilePath },
    Mkdirs(FilePath),
    Touch(FilePath),
    Symlink { link: FilePath, target: FilePath },
    DirectoryExists(FilePath),
    ListFiles(FilePath),
    ListRoots,
    Size(FilePath),
}

impl FileOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Read(_) => "read",
            Self::Write { .. } => "write",
            Self::Exists(_) => "exists",
            Self::Delete(_) => "delete",
            Self::Copy { .. } => "copy",
            Self::Move { .. } => "move",
            Self::Mkdirs(_) => "mkdirs",
            Self::Touch(_) => "touch",
            Self::Symlink { .. } => "symlink",
            Self::DirectoryExists(_) => "directory-exists",
            Self::ListFiles(_) => "list-files",
            Self::ListRoots => "list-roots",
            Self::Size(_) => "size",
        }
    }
}

impl ShellDialect {
    pub const ALL: [Self; 9] = [
        Self::Sh,
        Self::Dash,
        Self::Bash,
        Self::Zsh,
        Self::Fish,
        Self::PowerShell,
        Self::PowerShellCore,
        Self::Cmd,
        Self::Restricted,
    ];

    pub fn spec(self) -> &'static DialectSpec {
        match self {
            Self::Sh => &SH,
            Self::Dash => &DASH,
            Self::Bash => &BASH,
            Self::Zsh => &ZSH,
            Self::Fish => &FISH,
            Self::PowerShell => &POWERSHELL,
            Self::PowerShellCore => &PWSH,
            Self::Cmd => &CMD,
            Self::Restricted => &RESTRICTED,
        }
    }

    fn templates(self) -> &'static CommandTemplates {
        self.spec().templates
    }

    pub fn id(self) -> &'static str {
        self.spec().id
    }

    pub fn display_name(self) -> &'static str {
        self.spec().display_name
    }

    pub fn executable(self) -> &'static str {
        self.spec().executable
    }

    pub fn launch_args(self) -> &'static [&'static str] {
        self.spec().launch_args
    }

    pub fn script_extension(self) -> &'static str {
        self.spec().script_extension
    }

    pub fn family(self) -> DialectFamily {
        self.spec().family
    }

    pub fn dumb_mode(self) -> DumbMode {
        self.spec().dumb_mode
    }

    /// The OS this dialect implies, if any.
    pub fn default_os(self) -> Option<OsType> {
        self.spec().default_os
    }

    pub fn is_posix(self) -> bool {
        self.family() == DialectFamily::Posix
    }

    pub fn output_newline(self) -> &'static str {
        self.spec().output_newline
    }

    /// The dialect used for the local machine when nothing is configured.
    pub fn local_default() -> Self {
        if cfg!(target_os = "windows") {
            Self::Cmd
        } else {
            Self::Sh
        }
    }

    /// Guesses the dialect from an executable name or path such as `/usr/bin/zsh`
    /// or `C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe`.
    pub fn from_executable_name(name: &str) -> Option<Self> {
        let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
        let lower = file.to_ascii_lowercase();
        let stem = lower.strip_suffix(".exe").unwrap_or(&lower);
        match stem {
            "sh" | "ash" | "busybox" => Some(Self::Sh),
            "dash" => Some(Self::Dash),
            "bash" => Some(Self::Bash),
            "zsh" => Some(Self::Zsh),
            "fish" => Some(Self::Fish),
            "powershell" => Some(Self::PowerShell),
            "pwsh" => Some(Self::PowerShellCore),
            "cmd" => Some(Self::Cmd),
            _ => None,
        }
    }

    // --- QUOTING & FRAMING ---

    /// Quotes one argument so that the shell passes it through unchanged.
    pub fn quote_argument(self, argument: &str) -> Result<String, ShellError> {
        (self.templates().quote)(argument)
    }

    /// Splits a command line into arguments. Inverse of [`quote_argument`](Self::quote_argument).
    pub fn split_arguments(self, line: &str) -> Result<Vec<String>, ShellError> {
        (self.templates().split)(line)
    }

    /// Wraps `command` between the begin and end markers of `marker`.
    pub fn frame_command(self, command: &str, marker: &FrameMarker, separate_stderr: bool) -> String {
        (self.templates().frame)(command, marker, separate_stderr)
    }

    /// Needle that terminates a framed stdout body. The exit code follows it.
    pub(crate) fn stdout_end_needle(self, marker: &FrameMarker) -> Vec<u8> {
        format!("{}{}:", self.output_newline(), marker.end()).into_bytes()
    }

    pub(crate) fn stderr_end_needle(self, marker: &FrameMarker) -> Vec<u8> {
        let nl = self.output_newline();
        format!("{}{}{}", nl, marker.end(), nl).into_bytes()
    }

    /// Renders the one-shot invocation of this dialect that runs `command`, written in
    /// the syntax of the `host` shell. Used to layer sub-shells on one transport.
    pub fn inline_invocation(self, host: Self, command: &str) -> Result<String, ShellError> {
        let spec = self.spec();
        if spec.inline_args.is_empty() {
            return Err(ShellError::unsupported(self, "inline sub-shell invocation"));
        }
        let mut parts = Vec::with_capacity(spec.inline_args.len() + 2);
        parts.push(host.quote_argument(spec.executable)?);
        for arg in spec.inline_args {
            parts.push(host.quote_argument(arg)?);
        }
        if self.family() == DialectFamily::PowerShell {
            // `-Command` exits with 0 or 1 from `$?` and ignores `$LASTEXITCODE`.
            let propagated = format!(
                "$global:LASTEXITCODE = $null; {}; $__shellctl_rc = if ($?) {{ 0 }} else {{ 1 }}; if ($LASTEXITCODE) {{ $__shellctl_rc = $LASTEXITCODE }}; exit $__shellctl_rc",
                command
            );
            parts.push(host.quote_argument(&propagated)?);
        } else {
            parts.push(host.quote_argument(command)?);
        }
        let invocation = parts.join(" ");
        // PowerShell treats a quoted program name as a string, not a command.
        if host.family() == DialectFamily::PowerShell {
            return Ok(format!("& {}", invocation));
        }
        Ok(invocation)
    }

    pub fn with_environment(self, env: &[(String, String)], command: &str) -> Result<String, ShellError> {
        (self.templates().with_env)(env, command)
    }

    // --- FILE OPERATIONS ---

    /// Maps any file operation to its command. Pure; never touches I/O.
    pub fn command_for(self, operation: &FileOperation) -> Result<CommandBuilder, ShellError> {
        match operation {
            FileOperation::Read(p) => self.file_read_command(p),
            FileOperation::Write { path, size } => self.stream_file_write_command(path, *size),
            FileOperation::Exists(p) => self.file_exists_command(p),
            FileOperation::Delete(p) => self.delete_file_or_directory(p),
            FileOperation::Copy { from, to } => self.file_copy_command(from, to),
            FileOperation::Move { from, to } => self.file_move_command(from, to),
            FileOperation::Mkdirs(p) => self.mkdirs_command(p),
            FileOperation::Touch(p) => self.file_touch_command(p),
            FileOperation::Symlink { link, target } => self.symbolic_link(link, target),
            FileOperation::DirectoryExists(p) => self.directory_exists(p),
            FileOperation::ListFiles(p) => self.list_files(p),
            FileOperation::ListRoots => self.list_roots(),
            FileOperation::Size(p) => self.query_file_size(p),
        }
    }

    pub fn file_read_command(self, path: &FilePath) -> Result<CommandBuilder, ShellError> {
        (self.templates().file_read)(path)
    }

    /// Command that reads exactly `size` bytes from stdin into `path`.
    pub fn stream_file_write_command(self, path: &FilePath, size: u64) -> Result<CommandBuilder, ShellError> {
        (self.templates().stream_write)(path, size)
    }

    /// Check command: exit code 0 if `path` exists, 1 if not.
    pub fn file_exists_command(self, path: &FilePath) -> Result<CommandBuilder, ShellError> {
        (self.templates().file_exists)(path)
    }

    /// Removes a file or a whole directory tree. Succeeds if nothing exists at `path`.
    pub fn delete_file_or_directory(self, path: &FilePath) -> Result<CommandBuilder, ShellError> {
        (self.templates().delete)(path)
    }

    pub fn file_copy_command(self, from: &FilePath, to: &FilePath) -> Result<CommandBuilder, ShellError> {
        (self.templates().copy)(from, to)
    }

    pub fn file_move_command(self, from: &FilePath, to: &FilePath) -> Result<CommandBuilder, ShellError> {
        (self.templates().move_to)(from, to)
    }

    pub fn mkdirs_command(self, path: &FilePath) -> Result<CommandBuilder, ShellError> {
        (self.templates().mkdirs)(path)
    }

    pub fn file_touch_command(self, path: &FilePath) -> Result<CommandBuilder, ShellError> {
        (self.templates().touch)(path)
    }

    pub fn symbolic_link(self, link: &FilePath, target: &FilePath) -> Result<CommandBuilder, ShellError> {
        (self.templates().symlink)(link, target)
    }

    pub fn directory_exists(self, path: &FilePath) -> Result<CommandBuilder, ShellError> {
        (self.templates().directory_exists)(path)
    }

    /// Lists `dir` as `kind<TAB>size<TAB>name` lines, see [`parse_file_listing`].
    pub fn list_files(self, dir: &FilePath) -> Result<CommandBuilder, ShellError> {
        (self.templates().list_files)(dir)
    }

    pub fn list_roots(self) -> Result<CommandBuilder, ShellError> {
        (self.templates().list_roots)()
    }

    pub fn query_file_size(self, path: &FilePath) -> Result<CommandBuilder, ShellError> {
        (self.templates().file_size)(path)
    }

    // --- SESSION COMMANDS ---

    pub fn get_env_var(self, name: &str) -> Result<CommandBuilder, ShellError> {
        if !crate::core::command_builder::is_valid_variable_name(name) {
            return Err(ShellError::InvalidArgument(format!(
                "'{}' is not a valid environment variable name",
                name
            )));
        }
        (self.templates().get_env)(name)
    }

    pub fn cd_command(self, path: &FilePath) -> Result<CommandBuilder, ShellError> {
        (self.templates().cd)(path)
    }

    pub fn pwd_command(self) -> Result<CommandBuilder, ShellError> {
        (self.templates().pwd)()
    }

    /// Check command: exit code 0 if `name` resolves to an executable.
    pub fn which_command(self, name: &str) -> Result<CommandBuilder, ShellError> {
        (self.templates().which)(name)
    }

    pub fn process_exists_command(self, pid: u32) -> Result<CommandBuilder, ShellError> {
        (self.templates().process_exists)(pid)
    }

    pub fn temp_dir_command(self) -> Result<CommandBuilder, ShellError> {
        (self.templates().temp_dir)()
    }

    /// Prints something [`OsType::from_probe`] understands.
    pub fn os_probe_command(self) -> Result<CommandBuilder, ShellError> {
        (self.templates().os_probe)()
    }

    /// Prints `in:out`, each side present only when attached to a terminal.
    pub fn tty_probe_command(self) -> Result<CommandBuilder, ShellError> {
        (self.templates().tty_probe)()
    }

    /// For families with several members, prints the id of the running member.
    pub fn identify_command(self) -> Option<Result<CommandBuilder, ShellError>> {
        self.templates().identify.map(|f| f())
    }

    pub fn make_executable_command(self, path: &FilePath) -> Result<CommandBuilder, ShellError> {
        (self.templates().make_executable)(path)
    }

    /// Writes `content` line by line through the command text itself.
    ///
    /// For small files on transports whose stdin cannot carry a payload, such as inline
    /// sub-shells layered on a PowerShell process.
    pub fn write_lines_command(self, path: &FilePath, content: &str) -> Result<CommandBuilder, ShellError> {
        (self.templates().write_lines)(path, content)
    }

    pub fn noop_command(self) -> &'static str {
        self.templates().noop
    }

    pub fn exit_command(self) -> &'static str {
        self.templates().exit
    }

    /// Content of a script that answers successive askpass prompts with `secrets`, in order.
    pub fn askpass_fixed_content(self, secrets: &[SecretValue]) -> Result<String, ShellError> {
        (self.templates().askpass)(secrets)
    }

    /// Normalizes line endings and adds the interpreter line the dialect needs.
    pub fn prepare_script_content(self, content: &str) -> String {
        let spec = self.spec();
        (spec.templates.prepare_script)(spec, content)
    }
}

impl fmt::Display for ShellDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ShellDialect {
    type Err = ShellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.id() == wanted)
            .or_else(|| Self::from_executable_name(&wanted))
            .ok_or_else(|| ShellError::InvalidArgument(format!("Unknown shell dialect '{}'", s)))
    }
}

// --- SHARED HELPERS ---

pub(crate) fn reject_nul(argument: &str) -> Result<(), ShellError> {
    if argument.contains('\0') {
        return Err(ShellError::InvalidArgument(
            "arguments cannot contain NUL characters".to_string(),
        ));
    }
    Ok(())
}

/// Replaces every line ending with `newline`.
pub(crate) fn normalize_newlines(content: &str, newline: &str) -> String {
    let mut out = content.replace("\r\n", "\n").replace('\n', newline);
    if !out.ends_with(newline) {
        out.push_str(newline);
    }
    out
}

// --- RESULT PARSERS ---

lazy_static! {
    static ref LISTING_LINE: Regex =
        Regex::new(r"^([dfl])\t(\d+)\t(.*)$").expect("listing line pattern is valid");
}

/// Parses the output of [`ShellDialect::list_files`] for `dir`.
pub fn parse_file_listing(dir: &FilePath, output: &str) -> Result<Vec<FileEntry>, ShellError> {
    let mut entries = Vec::new();
    for line in output.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let caps = LISTING_LINE
            .captures(line)
            .ok_or_else(|| ShellError::UnexpectedOutput(format!("malformed listing line '{}'", line)))?;
        let (Some(kind), Some(size), Some(name)) = (caps.get(1), caps.get(2), caps.get(3)) else {
            continue;
        };
        let kind = match kind.as_str() {
            "d" => FileKind::Directory,
            "l" => FileKind::Link,
            _ => FileKind::File,
        };
        let size = size
            .as_str()
            .parse::<u64>()
            .map_err(|e| ShellError::UnexpectedOutput(format!("bad size in '{}': {}", line, e)))?;
        let name = name.as_str();
        if name == "." || name == ".." {
            continue;
        }
        entries.push(FileEntry {
            path: dir.join(name),
            kind,
            size,
        });
    }
    Ok(entries)
}

/// Parses the output of [`ShellDialect::list_roots`].
pub fn parse_roots(output: &str) -> Vec<FilePath> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(FilePath::from)
        .collect()
}

/// Parses the output of [`ShellDialect::query_file_size`].
pub fn parse_file_size(output: &str) -> Result<u64, ShellError> {
    let trimmed = output.trim();
    trimmed
        .parse::<u64>()
        .map_err(|_| ShellError::UnexpectedOutput(format!("'{}' is not a file size", trimmed)))
}

/// Parses the output of [`ShellDialect::tty_probe_command`].
pub fn parse_tty_probe(output: &str) -> TtyState {
    let trimmed = output.trim();
    let (input, output) = trimmed.split_once(':').unwrap_or((trimmed, ""));
    match (input == "in", output == "out") {
        (false, false) => TtyState::Absent,
        (false, true) => TtyState::OutputOnly,
        (true, _) => TtyState::MergedStderr,
    }
}

/// Maps the output of [`ShellDialect::identify_command`] to a more specific member of
/// the family, if it names one.
pub fn parse_identify(current: ShellDialect, output: &str) -> ShellDialect {
    match output.trim() {
        "zsh" => ShellDialect::Zsh,
        "bash" => ShellDialect::Bash,
        _ => current,
    }
}
