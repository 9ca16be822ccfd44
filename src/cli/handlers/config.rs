// src/cli/handlers/config.rs

use crate::{core::paths, system::shells_config};
use anyhow::{Context, Result};
use clap::Parser;
use colored::*;

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Shows the location and effective contents of shells.toml."
)]
struct ConfigArgs {
    /// Only print the path of the file.
    #[arg(long)]
    path: bool,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let config_args = ConfigArgs::try_parse_from(&args)?;
    let config_path = paths::get_shells_config_path()?;

    if config_args.path {
        println!("{}", config_path.display());
        return Ok(());
    }

    let config = shells_config::load_runtime_config_from(&config_path)?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    println!("{} {}\n", "#".dimmed(), config_path.display().to_string().dimmed());
    print!("{}", rendered);
    Ok(())
}
