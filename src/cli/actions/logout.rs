use crate::cli::globals::GlobalArgs;
use anyhow::{Context, Result};

/// Execute the logout action.
/// # Errors
/// Returns an error if the session file cannot be removed.
pub fn execute(globals: &GlobalArgs) -> Result<()> {
    let client = globals.client()?;
    let ended = client.auth().logout().context("logout failed")?;

    if ended {
        println!("signed out");
    } else {
        println!("no session stored");
    }
    Ok(())
}
