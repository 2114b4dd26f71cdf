use crate::cli::globals::GlobalArgs;
use anyhow::{Context, Result};
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub username: String,
    pub password: SecretString,
}

/// Execute the register action.
/// # Errors
/// Returns an error if the account cannot be created.
pub async fn execute(args: Args) -> Result<()> {
    let client = args.globals.client()?;

    client
        .auth()
        .register(&args.username, &args.password)
        .await
        .context("registration failed")?;

    println!(
        "account {} created, sign in with `taskify-session login`",
        args.username
    );
    Ok(())
}
