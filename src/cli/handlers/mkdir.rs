// src/cli/handlers/mkdir.rs

use crate::{
    cli::{args::SessionArgs, handlers::commons},
    models::FilePath,
    system::filesystem::ConnectionFileSystem,
};
use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Creates directories and any missing parents.")]
struct MkdirArgs {
    #[command(flatten)]
    session: SessionArgs,

    #[arg(required = true)]
    paths: Vec<String>,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let mkdir_args = MkdirArgs::try_parse_from(&args)?;

    commons::with_session(&mkdir_args.session, |shell| {
        let mut fs = ConnectionFileSystem::new(shell);
        for path in &mkdir_args.paths {
            fs.mkdirs(&FilePath::of(path.as_str()))?;
        }
        Ok(())
    })
}
