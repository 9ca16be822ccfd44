// src/cli/handlers/script.rs

use crate::{
    cli::{args::SessionArgs, handlers::commons},
    core::command_builder::CommandBuilder,
    dialect::DialectFamily,
    system::script_helper,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Writes a local script into the session's temporary directory and runs it."
)]
struct ScriptArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// The local script file.
    file: PathBuf,

    /// Only write the script and print its path.
    #[arg(long)]
    no_run: bool,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let script_args = ScriptArgs::try_parse_from(&args)?;
    let content = std::fs::read_to_string(&script_args.file)
        .with_context(|| format!("Failed to read '{}'", script_args.file.display()))?;

    commons::with_session(&script_args.session, |shell| {
        let path = script_helper::create_exec_script(shell, &content)?;
        if script_args.no_run {
            println!("{}", path);
            return Ok(());
        }

        let mut command = CommandBuilder::of();
        if shell.dialect().family() == DialectFamily::PowerShell {
            command = command.add("&");
        }
        let output = shell.command(command.add_file(path))?.execute()?;
        print!("{}", output.stdout);
        eprint!("{}", output.stderr);
        if !output.success() {
            anyhow::bail!("Script exited with code {}", output.exit_code);
        }
        Ok(())
    })
}
