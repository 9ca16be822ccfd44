// src/cli/handlers/exec.rs

use crate::{
    cli::{args::SessionArgs, handlers::commons},
    system::error::ShellError,
};
use anyhow::Result;
use clap::Parser;
use std::{io::Write, time::Duration};

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Runs a command in a shell session and prints its output."
)]
struct ExecArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// Fails the command if it has not finished after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// The command line, passed to the shell as written.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let exec_args = ExecArgs::try_parse_from(&args)?;
    let text = exec_args.command.join(" ");

    let output = commons::with_session(&exec_args.session, |shell| {
        let mut command = shell.command(text.as_str())?;
        if let Some(seconds) = exec_args.timeout {
            command = command.with_exit_timeout(Duration::from_secs(seconds));
        }
        Ok(command.execute()?)
    })?;

    if exec_args.session.json {
        commons::print_json(&serde_json::json!({
            "exit_code": output.exit_code,
            "stdout": output.stdout,
            "stderr": output.stderr,
        }))?;
    } else {
        print!("{}", output.stdout);
        eprint!("{}", output.stderr);
        std::io::stdout().flush()?;
    }

    if !output.success() {
        return Err(ShellError::ProcessOutput {
            command: text,
            exit_code: output.exit_code,
            stdout: String::new(),
            stderr: String::new(),
        }
        .into());
    }
    Ok(())
}
