// src/cli/handlers/askpass.rs

use crate::{
    cli::{args::SessionArgs, handlers::commons},
    models::SecretValue,
    system::script_helper,
};
use anyhow::{Result, bail};
use clap::Parser;
use dialoguer::{Password, theme::ColorfulTheme};

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Writes an askpass helper into the session that answers with the given secrets, one per call."
)]
struct AskpassArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// How many secrets to prompt for.
    #[arg(long, short, default_value_t = 1)]
    count: usize,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let askpass_args = AskpassArgs::try_parse_from(&args)?;
    if askpass_args.count == 0 {
        bail!("At least one secret is required.");
    }

    let theme = ColorfulTheme::default();
    let mut secrets = Vec::with_capacity(askpass_args.count);
    for i in 1..=askpass_args.count {
        let secret = Password::with_theme(&theme)
            .with_prompt(format!("Secret {}/{}", i, askpass_args.count))
            .allow_empty_password(true)
            .interact()?;
        secrets.push(SecretValue::new(secret));
    }

    let path = commons::with_session(&askpass_args.session, |shell| {
        Ok(script_helper::create_askpass_script(shell, &secrets)?)
    })?;

    if askpass_args.session.json {
        return commons::print_json(&serde_json::json!({ "path": path }));
    }
    println!("{}", path);
    Ok(())
}
