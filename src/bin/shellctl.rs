// src/bin/shellctl.rs

use clap::Parser;
use colored::*;
use shellctl::{
    ShellError,
    cli::{Cli, dispatcher},
};

/// The main entry point of the `shellctl` application.
/// It sets up logging, parses arguments, dispatches to the correct handler,
/// and performs centralized error handling.
fn main() {
    env_logger::init();

    if let Err(e) = dispatcher::dispatch(Cli::parse().args) {
        // --- Centralized Error Handling ---
        // Argument errors render their own usage text.
        if let Some(clap_err) = e.downcast_ref::<clap::Error>() {
            clap_err.exit();
        }

        // Expected failures are operational: the message alone is enough.
        let expected = e
            .chain()
            .find_map(|cause| cause.downcast_ref::<ShellError>())
            .is_some_and(ShellError::is_expected);
        if expected {
            eprintln!("\n{}: {}", "Error".red().bold(), e);
        } else {
            eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        }
        std::process::exit(1);
    }
}
