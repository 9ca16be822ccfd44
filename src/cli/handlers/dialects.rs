// src/cli/handlers/dialects.rs

use crate::{
    cli::handlers::commons,
    dialect::{DumbMode, ShellDialect},
};
use anyhow::Result;
use clap::Parser;
use colored::*;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Lists the supported shell dialects.")]
struct DialectsArgs {
    /// Prints JSON instead of a table.
    #[arg(long)]
    json: bool,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let dialects_args = DialectsArgs::try_parse_from(&args)?;

    if dialects_args.json {
        let rows: Vec<_> = ShellDialect::ALL
            .iter()
            .map(|d| {
                serde_json::json!({
                    "id": d.id(),
                    "name": d.display_name(),
                    "executable": d.executable(),
                    "family": format!("{:?}", d.family()).to_lowercase(),
                    "interactive": d.dumb_mode().supports_any_possible_interaction(),
                })
            })
            .collect();
        return commons::print_json(&rows);
    }

    println!(
        "{:<12} {:<20} {:<16} {}",
        "ID".bold(),
        "NAME".bold(),
        "EXECUTABLE".bold(),
        "FAMILY".bold()
    );
    for dialect in ShellDialect::ALL {
        let family = format!("{:?}", dialect.family());
        let line = format!(
            "{:<12} {:<20} {:<16} {}",
            dialect.id(),
            dialect.display_name(),
            dialect.executable(),
            family
        );
        match dialect.dumb_mode() {
            DumbMode::Interactive => println!("{}", line),
            DumbMode::Unsupported { .. } => println!("{}", line.dimmed()),
        }
    }
    Ok(())
}
