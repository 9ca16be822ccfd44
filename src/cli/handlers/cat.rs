// src/cli/handlers/cat.rs

use crate::{
    cli::{args::SessionArgs, handlers::commons},
    models::FilePath,
    system::filesystem::ConnectionFileSystem,
};
use anyhow::Result;
use clap::Parser;
use std::io::{self, Write};

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Streams the contents of a file to stdout.")]
struct CatArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// The file to read.
    path: String,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let cat_args = CatArgs::try_parse_from(&args)?;
    let path = FilePath::of(cat_args.path.as_str());

    commons::with_session(&cat_args.session, |shell| {
        let mut fs = ConnectionFileSystem::new(shell);
        let mut input = fs.open_input(&path)?;
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let copied = io::copy(&mut input, &mut out)?;
        out.flush()?;
        input.close_or_throw()?;
        log::debug!("Streamed {} bytes from {}", copied, path);
        Ok(())
    })
}
