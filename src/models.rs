// src/models.rs

use serde::{Deserialize, Serialize};
use std::fmt;

// --- SESSION IDENTITY ---

/// Slot of a session inside the [`SessionRegistry`](crate::core::registry::SessionRegistry)
/// arena, tagged with the slot's generation in the upper 32 bits. Slots are reused once
/// their session is pruned, so an id from an earlier generation never resolves again.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl SessionId {
    pub fn new(slot: u32, generation: u32) -> Self {
        Self((u64::from(generation) << 32) | u64::from(slot))
    }

    pub fn slot(self) -> u32 {
        u32::try_from(self.0 & u64::from(u32::MAX)).unwrap_or(u32::MAX)
    }

    pub fn generation(self) -> u32 {
        u32::try_from(self.0 >> 32).unwrap_or(u32::MAX)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.generation() {
            0 => write!(f, "#{}", self.slot()),
            generation => write!(f, "#{}.{}", self.slot(), generation),
        }
    }
}

/// Index of one underlying shell process. Several sessions share a transport when
/// sub-shells are invoked inline.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransportId(pub u64);

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Lifecycle of a shell session.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Starting,
    Running,
    Closing,
    Closed,
    Failed,
}

impl SessionState {
    /// Returns `true` once the session can never accept commands again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

// --- TERMINAL STATE ---

/// Whether and how a pseudo-terminal sits between us and the shell.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TtyState {
    /// Plain pipes. Stdout and stderr are separate and binary-safe.
    #[default]
    Absent,
    /// A PTY is allocated and stderr is merged into stdout.
    MergedStderr,
    /// A PTY is allocated that forwards output but swallows our input.
    OutputOnly,
}

impl TtyState {
    pub fn preserves_output(self) -> bool {
        matches!(self, Self::Absent | Self::OutputOnly)
    }

    pub fn supports_input(self) -> bool {
        matches!(self, Self::Absent | Self::MergedStderr)
    }

    /// Stderr can only be framed separately when it is not merged into stdout.
    pub fn has_separate_stderr(self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl fmt::Display for TtyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Absent => "no tty",
            Self::MergedStderr => "tty with merged stderr",
            Self::OutputOnly => "output-only tty",
        };
        f.write_str(s)
    }
}

// --- OPERATING SYSTEM ---

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    Linux,
    MacOs,
    Bsd,
    Windows,
    #[default]
    Unknown,
}

impl OsType {
    /// Maps the output of `uname -s` (or an equivalent probe) to an OS family.
    pub fn from_probe(output: &str) -> Self {
        let name = output.trim().to_ascii_lowercase();
        if name.starts_with("linux") {
            Self::Linux
        } else if name.starts_with("darwin") {
            Self::MacOs
        } else if name.contains("bsd") || name.starts_with("dragonfly") {
            Self::Bsd
        } else if name.starts_with("windows") || name.starts_with("mingw") || name.starts_with("msys") || name.starts_with("cygwin") {
            Self::Windows
        } else {
            Self::Unknown
        }
    }

    pub fn is_windows(self) -> bool {
        self == Self::Windows
    }
}

// --- FILE SYSTEM ---

/// A path on the system behind a shell. It is kept as text because the separator
/// depends on the remote side, not on the machine running this crate.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct FilePath(String);

impl FilePath {
    pub fn of(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Windows paths use backslashes, or start with a drive letter.
    pub fn is_windows_style(&self) -> bool {
        let mut chars = self.0.chars();
        let drive = matches!((chars.next(), chars.next()), (Some(c), Some(':')) if c.is_ascii_alphabetic());
        drive || (self.0.contains('\\') && !self.0.contains('/'))
    }

    fn separator(&self) -> char {
        if self.is_windows_style() { '\\' } else { '/' }
    }

    /// Appends a child component, inserting a separator only when needed.
    pub fn join(&self, child: &str) -> Self {
        let sep = self.separator();
        let child = child.trim_start_matches(['/', '\\']);
        if self.0.is_empty() {
            return Self(child.to_string());
        }
        if self.0.ends_with(['/', '\\']) {
            Self(format!("{}{}", self.0, child))
        } else {
            Self(format!("{}{}{}", self.0, sep, child))
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.0
            .trim_end_matches(['/', '\\'])
            .rsplit(['/', '\\'])
            .next()
            .filter(|s| !s.is_empty())
    }

    pub fn parent(&self) -> Option<Self> {
        let trimmed = self.0.trim_end_matches(['/', '\\']);
        let idx = trimmed.rfind(['/', '\\'])?;
        let (head, _) = trimmed.split_at(idx);
        if head.is_empty() {
            // The parent of `/foo` is `/`.
            return Some(Self(self.separator().to_string()));
        }
        if head.len() == 2 && head.ends_with(':') {
            return Some(Self(format!("{}\\", head)));
        }
        Some(Self(head.to_string()))
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/" || (self.0.len() == 3 && self.is_windows_style() && self.0.ends_with('\\'))
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FilePath {
    fn from(value: &str) -> Self {
        Self::of(value)
    }
}

impl From<String> for FilePath {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
    Link,
}

/// One entry produced by a directory listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: FilePath,
    pub kind: FileKind,
    pub size: u64,
}

impl FileEntry {
    pub fn name(&self) -> &str {
        self.path.file_name().unwrap_or_else(|| self.path.as_str())
    }
}

// --- CREDENTIALS ---

/// A secret that never shows up in logs or debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn secret_value(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(<redacted>)")
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}
