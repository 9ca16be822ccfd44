// src/cli/handlers/roots.rs

use crate::{
    cli::{args::SessionArgs, handlers::commons},
    system::filesystem::ConnectionFileSystem,
};
use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Lists the file system roots of the session.")]
struct RootsArgs {
    #[command(flatten)]
    session: SessionArgs,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let roots_args = RootsArgs::try_parse_from(&args)?;

    let roots = commons::with_session(&roots_args.session, |shell| {
        Ok(ConnectionFileSystem::new(shell).list_roots()?)
    })?;

    if roots_args.session.json {
        return commons::print_json(&roots);
    }
    for root in &roots {
        println!("{}", root);
    }
    Ok(())
}
