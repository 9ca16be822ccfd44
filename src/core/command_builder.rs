// src/core/command_builder.rs

use crate::{
    dialect::ShellDialect,
    models::{FilePath, OsType},
    system::error::ShellError,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::{fmt, sync::Arc};

lazy_static! {
    static ref ENV_NAME: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("environment name pattern is valid");
}

/// Returns `true` if `name` can be used as an environment variable name in every dialect.
pub fn is_valid_variable_name(name: &str) -> bool {
    ENV_NAME.is_match(name)
}

/// What a deferred fragment gets to see about the shell that will run the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    pub dialect: ShellDialect,
    pub os: OsType,
}

impl ExecutionContext {
    pub fn new(dialect: ShellDialect) -> Self {
        Self {
            dialect,
            os: dialect.default_os().unwrap_or_default(),
        }
    }

    pub fn with_os(mut self, os: OsType) -> Self {
        self.os = os;
        self
    }
}

/// A fragment that is only rendered once the executing shell is known.
pub type DeferredFn = Arc<dyn Fn(&ExecutionContext) -> Result<String, ShellError> + Send + Sync>;

/// One piece of a command line.
#[derive(Clone)]
pub enum CommandElement {
    /// Inserted verbatim.
    Literal(String),
    /// Quoted with the executing dialect's argument rules.
    Quoted(String),
    /// A path on the target system, quoted like an argument.
    File(FilePath),
    Deferred(DeferredFn),
}

impl fmt::Debug for CommandElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            Self::Quoted(s) => f.debug_tuple("Quoted").field(s).finish(),
            Self::File(p) => f.debug_tuple("File").field(p).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// An ordered list of command fragments, rendered lazily against a dialect.
///
/// Quoting rules differ between shells, so nothing is escaped until [`build`](Self::build)
/// is called with the context of the shell that will actually execute the command.
#[derive(Clone, Debug, Default)]
pub struct CommandBuilder {
    elements: Vec<CommandElement>,
    environment: Vec<(String, String)>,
}

impl CommandBuilder {
    pub fn of() -> Self {
        Self::default()
    }

    pub fn of_string(command: impl Into<String>) -> Self {
        Self::of().add(command)
    }

    pub fn of_function<F>(f: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Result<String, ShellError> + Send + Sync + 'static,
    {
        Self::of().add_function(f)
    }

    pub fn add(mut self, literal: impl Into<String>) -> Self {
        self.elements.push(CommandElement::Literal(literal.into()));
        self
    }

    pub fn add_quoted(mut self, argument: impl Into<String>) -> Self {
        self.elements.push(CommandElement::Quoted(argument.into()));
        self
    }

    pub fn add_file(mut self, path: impl Into<FilePath>) -> Self {
        self.elements.push(CommandElement::File(path.into()));
        self
    }

    pub fn add_files<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<FilePath>,
    {
        self.elements
            .extend(paths.into_iter().map(|p| CommandElement::File(p.into())));
        self
    }

    pub fn add_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Result<String, ShellError> + Send + Sync + 'static,
    {
        self.elements.push(CommandElement::Deferred(Arc::new(f)));
        self
    }

    /// Appends all fragments (and environment) of another builder.
    pub fn add_all(mut self, other: Self) -> Self {
        self.elements.extend(other.elements);
        self.environment.extend(other.environment);
        self
    }

    pub fn prepend(mut self, literal: impl Into<String>) -> Self {
        self.elements.insert(0, CommandElement::Literal(literal.into()));
        self
    }

    /// Sets an environment variable for this command only, where the dialect allows it.
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.push((name.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[CommandElement] {
        &self.elements
    }

    /// Renders the command for the given shell.
    pub fn build(&self, ctx: &ExecutionContext) -> Result<String, ShellError> {
        let mut parts = Vec::with_capacity(self.elements.len());
        for element in &self.elements {
            let rendered = match element {
                CommandElement::Literal(s) => s.clone(),
                CommandElement::Quoted(s) => ctx.dialect.quote_argument(s)?,
                CommandElement::File(p) => ctx.dialect.quote_argument(p.as_str())?,
                CommandElement::Deferred(f) => f(ctx)?,
            };
            if !rendered.is_empty() {
                parts.push(rendered);
            }
        }
        let command = parts.join(" ");

        if self.environment.is_empty() {
            return Ok(command);
        }
        if let Some((bad, _)) = self
            .environment
            .iter()
            .find(|(name, _)| !is_valid_variable_name(name))
        {
            return Err(ShellError::InvalidArgument(format!(
                "'{}' is not a valid environment variable name",
                bad
            )));
        }
        ctx.dialect.with_environment(&self.environment, &command)
    }

    /// A dialect-free rendering used for logs and error messages.
    pub fn build_for_display(&self) -> String {
        self.elements
            .iter()
            .map(|element| match element {
                CommandElement::Literal(s) => s.clone(),
                CommandElement::Quoted(s) => format!("\"{}\"", s),
                CommandElement::File(p) => format!("\"{}\"", p),
                CommandElement::Deferred(_) => "<deferred>".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<&str> for CommandBuilder {
    fn from(value: &str) -> Self {
        Self::of_string(value)
    }
}

impl From<String> for CommandBuilder {
    fn from(value: String) -> Self {
        Self::of_string(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_quotes_per_dialect() {
        let builder = CommandBuilder::of()
            .add("ls")
            .add("-la")
            .add_file("/tmp/it's here");

        let posix = builder.build(&ExecutionContext::new(ShellDialect::Bash)).unwrap();
        assert_eq!(posix, "ls -la '/tmp/it'\\''s here'");

        let pwsh = builder
            .build(&ExecutionContext::new(ShellDialect::PowerShell))
            .unwrap();
        assert_eq!(pwsh, "ls -la '/tmp/it''s here'");
    }

    #[test]
    fn test_deferred_fragment_sees_executing_dialect() {
        let builder = CommandBuilder::of_function(|ctx| Ok(ctx.dialect.id().to_string()));
        assert_eq!(
            builder.build(&ExecutionContext::new(ShellDialect::Zsh)).unwrap(),
            "zsh"
        );
        assert_eq!(
            builder.build(&ExecutionContext::new(ShellDialect::Cmd)).unwrap(),
            "cmd"
        );
    }

    #[test]
    fn test_environment_is_rendered_by_dialect() {
        let builder = CommandBuilder::of_string("env").env("GREETING", "hi there");
        let rendered = builder.build(&ExecutionContext::new(ShellDialect::Sh)).unwrap();
        assert_eq!(rendered, "(export GREETING='hi there'; env)");
    }

    #[test]
    fn test_invalid_environment_name_is_rejected() {
        let builder = CommandBuilder::of_string("env").env("BAD NAME", "x");
        let err = builder
            .build(&ExecutionContext::new(ShellDialect::Sh))
            .unwrap_err();
        assert!(matches!(err, ShellError::InvalidArgument(_)));
    }

    #[test]
    fn test_display_rendering_never_fails() {
        let builder = CommandBuilder::of()
            .add("cp")
            .add_files(["/a", "/b c"])
            .add_function(|_| Ok(String::new()));
        assert_eq!(builder.build_for_display(), "cp \"/a\" \"/b c\" <deferred>");
    }
}
