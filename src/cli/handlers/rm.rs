// src/cli/handlers/rm.rs

use crate::{
    cli::{args::SessionArgs, handlers::commons},
    models::FilePath,
    system::filesystem::ConnectionFileSystem,
};
use anyhow::Result;
use clap::Parser;
use dialoguer::{Confirm, theme::ColorfulTheme};

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Deletes files or directories (recursively) in the session."
)]
struct RmArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// The paths to delete.
    #[arg(required = true)]
    paths: Vec<String>,

    /// Do not ask for confirmation.
    #[arg(long, short)]
    yes: bool,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let rm_args = RmArgs::try_parse_from(&args)?;

    if !rm_args.yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Delete {} path(s) recursively?", rm_args.paths.len()))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    commons::with_session(&rm_args.session, |shell| {
        let mut fs = ConnectionFileSystem::new(shell);
        for path in &rm_args.paths {
            fs.delete(&FilePath::of(path.as_str()))?;
        }
        Ok(())
    })
}
