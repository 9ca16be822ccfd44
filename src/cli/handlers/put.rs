// src/cli/handlers/put.rs

use crate::{
    cli::{args::SessionArgs, handlers::commons},
    models::FilePath,
    system::filesystem::ConnectionFileSystem,
};
use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::{fs::File, path::PathBuf};

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Uploads a local file through the session.")]
struct PutArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// The local file.
    source: PathBuf,

    /// Where to write it in the session.
    destination: String,

    /// Also create the destination's parent directories.
    #[arg(long, short)]
    parents: bool,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let put_args = PutArgs::try_parse_from(&args)?;
    let mut file = File::open(&put_args.source)
        .with_context(|| format!("Failed to open '{}'", put_args.source.display()))?;
    let size = file.metadata()?.len();
    let destination = FilePath::of(put_args.destination.as_str());

    commons::with_session(&put_args.session, |shell| {
        let mut fs = ConnectionFileSystem::new(shell);
        if put_args.parents
            && let Some(parent) = destination.parent()
        {
            fs.mkdirs(&parent)?;
        }
        fs.upload(&destination, size, &mut file)?;
        Ok(())
    })?;

    if put_args.session.json {
        return commons::print_json(&upload_report(&destination, size));
    }
    println!("{} {} bytes to {}", "Uploaded".green(), size, destination);
    Ok(())
}

fn upload_report(destination: &FilePath, size: u64) -> serde_json::Value {
    serde_json::json!({
        "destination": destination,
        "size": size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_report_names_destination_and_size() {
        let report = upload_report(&FilePath::of("/srv/it's here.txt"), 70_000);

        assert_eq!(
            report,
            serde_json::json!({ "destination": "/srv/it's here.txt", "size": 70_000 })
        );
    }
}
