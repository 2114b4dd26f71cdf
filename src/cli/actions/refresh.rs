use super::roles_label;
use crate::cli::globals::GlobalArgs;
use anyhow::{Context, Result};

/// Execute the refresh action: renew the access token without waiting for a
/// request to be rejected.
/// # Errors
/// Returns an error if the renewal fails; the stored session is gone by then.
pub async fn execute(globals: &GlobalArgs) -> Result<()> {
    let client = globals.client()?;

    let session = client
        .coordinator()
        .renew()
        .await
        .context("session renewal failed, sign in again")?;

    println!("session renewed (roles: {})", roles_label(&session));
    Ok(())
}
