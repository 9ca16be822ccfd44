// src/cli/handlers/info.rs

use crate::cli::{args::SessionArgs, handlers::commons};
use anyhow::Result;
use clap::Parser;
use colored::*;

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Starts a shell session and displays what was detected about it."
)]
struct InfoArgs {
    #[command(flatten)]
    session: SessionArgs,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let info_args = InfoArgs::try_parse_from(&args)?;

    let report = commons::with_session(&info_args.session, |shell| {
        shell.start()?;
        let working_directory = shell.working_directory().ok();
        let temp_directory = shell.system_temporary_directory()?;
        Ok(serde_json::json!({
            "session": shell.id().0,
            "parent": shell.parent_id().map(|p| p.0),
            "dialect": shell.dialect(),
            "os": shell.os_type(),
            "tty": shell.tty_state(),
            "transport": shell.transport_id().map(|t| t.0),
            "owns_transport": shell.owns_transport(),
            "launch": shell.provider().describe(),
            "working_directory": working_directory,
            "temp_directory": temp_directory,
        }))
    })?;

    if info_args.session.json {
        return commons::print_json(&report);
    }

    println!("\n--- {} ---", "Shell session".yellow());
    if let Some(fields) = report.as_object() {
        for (key, value) in fields {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => "-".dimmed().to_string(),
                other => other.to_string(),
            };
            println!("  {:<18} {}", key.blue(), value);
        }
    }
    Ok(())
}
