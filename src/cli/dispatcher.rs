// src/cli/dispatcher.rs

use crate::cli::handlers;
use anyhow::{Result, bail};

// --- Command Definition and Registry ---

/// A CLI command, its aliases and its handler. Handlers receive the arguments that
/// follow the command name and parse them themselves.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    about: &'static str,
    handler: fn(Vec<String>) -> Result<()>,
}

/// The single source of truth for all commands.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "exec",
        aliases: &["x"],
        about: "Run a command in a shell session",
        handler: handlers::exec::handle,
    },
    CommandDefinition {
        name: "script",
        aliases: &[],
        about: "Copy a local script into the session and run it",
        handler: handlers::script::handle,
    },
    CommandDefinition {
        name: "info",
        aliases: &["check"],
        about: "Start a session and describe it",
        handler: handlers::info::handle,
    },
    CommandDefinition {
        name: "ls",
        aliases: &["list"],
        about: "List a directory",
        handler: handlers::ls::handle,
    },
    CommandDefinition {
        name: "cat",
        aliases: &["get"],
        about: "Stream a file to stdout",
        handler: handlers::cat::handle,
    },
    CommandDefinition {
        name: "put",
        aliases: &["upload"],
        about: "Upload a local file",
        handler: handlers::put::handle,
    },
    CommandDefinition {
        name: "rm",
        aliases: &["delete"],
        about: "Delete files or directories",
        handler: handlers::rm::handle,
    },
    CommandDefinition {
        name: "mkdir",
        aliases: &[],
        about: "Create directories and their parents",
        handler: handlers::mkdir::handle,
    },
    CommandDefinition {
        name: "roots",
        aliases: &[],
        about: "List file system roots",
        handler: handlers::roots::handle,
    },
    CommandDefinition {
        name: "askpass",
        aliases: &[],
        about: "Write an askpass helper answering with prompted secrets",
        handler: handlers::askpass::handle,
    },
    CommandDefinition {
        name: "dialects",
        aliases: &[],
        about: "List the supported shell dialects",
        handler: handlers::dialects::handle,
    },
    CommandDefinition {
        name: "config",
        aliases: &[],
        about: "Show the shells.toml in use",
        handler: handlers::config::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Routes `<command> [args...]` to its handler.
pub fn dispatch(all_args: Vec<String>) -> Result<()> {
    log::debug!("Dispatching args: {:?}", all_args);

    let mut args = all_args.into_iter();
    let Some(name) = args.next() else {
        print_usage();
        return Ok(());
    };
    if name == "help" {
        print_usage();
        return Ok(());
    }

    match find_command(&name) {
        Some(command) => (command.handler)(args.collect()),
        None => bail!("Unknown command '{}'. Run 'shellctl help' for the list of commands.", name),
    }
}

fn print_usage() {
    use colored::Colorize;

    println!("{} shellctl <command> [options] [args...]\n", "Usage:".yellow().bold());
    println!("{}", "Commands:".yellow().bold());
    for command in COMMAND_REGISTRY {
        let aliases = if command.aliases.is_empty() {
            String::new()
        } else {
            format!(" ({})", command.aliases.join(", "))
        };
        println!(
            "  {:<10} {}{}",
            command.name.cyan(),
            command.about,
            aliases.dimmed()
        );
    }
    println!(
        "\nRun '{}' for the options of a command.",
        "shellctl <command> --help".cyan()
    );
}
