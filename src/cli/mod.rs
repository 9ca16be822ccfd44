// src/cli/mod.rs

use clap::Parser;

pub mod args;
pub mod dispatcher;
pub mod handlers;

/// shellctl: drive local and remote shells through one command and file contract.
///
/// Usage: `shellctl <command> [options] [args...]`
///
/// Session options accepted by every command that opens a shell:
///   --dialect <DIALECT>   dialect of the root shell (detected when omitted)
///   --via <PREFIX>        command prefix reaching the shell, e.g. "ssh -T host"
///   --sub <DIALECT>       open a sub-shell on top (repeatable)
///   --json                machine-readable output
///
/// Run `shellctl <command> --help` for the options of a single command and
/// `shellctl dialects` for the list of dialects.
#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(disable_help_subcommand = true)]
#[command(trailing_var_arg = true)]
pub struct Cli {
    /// The command followed by its arguments.
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}
