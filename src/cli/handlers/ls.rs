// src/cli/handlers/ls.rs

use crate::{
    cli::{args::SessionArgs, handlers::commons},
    models::{FileKind, FilePath},
    system::filesystem::ConnectionFileSystem,
};
use anyhow::Result;
use clap::Parser;
use colored::*;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Lists the direct children of a directory.")]
struct LsArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// The directory to list. Defaults to the session's working directory.
    dir: Option<String>,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let ls_args = LsArgs::try_parse_from(&args)?;

    let mut entries = commons::with_session(&ls_args.session, |shell| {
        let dir = match &ls_args.dir {
            Some(dir) => FilePath::of(dir.as_str()),
            None => shell.working_directory()?,
        };
        Ok(ConnectionFileSystem::new(shell).list_files(&dir)?)
    })?;
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    if ls_args.session.json {
        return commons::print_json(&entries);
    }
    for entry in &entries {
        let name = match entry.kind {
            FileKind::Directory => format!("{}/", entry.name()).blue().bold(),
            FileKind::Link => entry.name().cyan(),
            FileKind::File => entry.name().normal(),
        };
        println!("{:>12}  {}", entry.size, name);
    }
    Ok(())
}
