// src/cli/handlers/commons.rs

use crate::{
    cli::args::SessionArgs,
    dialect::ShellDialect,
    system::{provider::CommandPrefixProvider, runtime::ShellRuntime, shell::ShellControl},
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

/// Opens the session described by `args`, runs `f` on its innermost shell and closes
/// everything again, whatever `f` returned.
pub fn with_session<T>(args: &SessionArgs, f: impl FnOnce(&mut ShellControl) -> Result<T>) -> Result<T> {
    let mut runtime = ShellRuntime::load().context("Failed to load shells.toml")?;
    let mut root = match &args.via {
        Some(prefix) => {
            let provider = CommandPrefixProvider::parse(prefix)?;
            log::debug!("Reaching the shell through '{}'", prefix);
            runtime.session_via(Arc::new(provider), args.dialect)
        }
        None => runtime.session(args.dialect),
    };

    let result = run_in_sub_shells(&mut root, &args.sub_shells, f);
    root.close();
    runtime.shutdown(false);
    result
}

fn run_in_sub_shells<T>(
    shell: &mut ShellControl,
    chain: &[ShellDialect],
    f: impl FnOnce(&mut ShellControl) -> Result<T>,
) -> Result<T> {
    let Some((dialect, rest)) = chain.split_first() else {
        return f(shell);
    };
    shell.start()?;
    let mut sub = shell.sub_shell(*dialect);
    let result = run_in_sub_shells(&mut sub, rest, f);
    sub.close();
    result
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
