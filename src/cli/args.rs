// src/cli/args.rs

use crate::dialect::ShellDialect;
use clap::Args;

/// Options shared by every command that opens a shell session.
#[derive(Args, Debug, Default, Clone)]
pub struct SessionArgs {
    /// Dialect of the root shell. Detected from the shell itself when omitted.
    #[arg(long, short)]
    pub dialect: Option<ShellDialect>,

    /// Command prefix that reaches the shell (e.g. "ssh -T user@host").
    #[arg(long, value_name = "PREFIX")]
    pub via: Option<String>,

    /// Opens a sub-shell of this dialect on top of the root shell. Repeatable; the
    /// command runs in the innermost one.
    #[arg(long = "sub", value_name = "DIALECT")]
    pub sub_shells: Vec<ShellDialect>,

    /// Prints JSON instead of text.
    #[arg(long)]
    pub json: bool,
}
