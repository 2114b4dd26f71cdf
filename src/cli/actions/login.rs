use super::roles_label;
use crate::cli::globals::GlobalArgs;
use anyhow::{Context, Result};
use secrecy::SecretString;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub username: String,
    pub password: SecretString,
}

/// Execute the login action.
/// # Errors
/// Returns an error if the credentials are rejected or the session cannot be
/// stored.
pub async fn execute(args: Args) -> Result<()> {
    let client = args.globals.client()?;
    debug!(api_url = %args.globals.api_url, "signing in");

    let session = client
        .auth()
        .login(&args.username, &args.password)
        .await
        .context("login failed")?;

    println!(
        "signed in as {} (roles: {})",
        args.username,
        roles_label(&session)
    );
    if session.refresh_token.is_none() {
        println!("note: the server issued no refresh token; sign in again when the session expires");
    }
    Ok(())
}
