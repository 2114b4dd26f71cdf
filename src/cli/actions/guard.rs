use crate::{
    cli::globals::GlobalArgs,
    session::{GuardState, ViewRequirement},
};
use anyhow::{bail, Result};
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub role: Option<String>,
}

/// Execute the guard action: report whether a view with the given
/// requirement may be shown, restoring the session first if only a refresh
/// token is stored.
/// # Errors
/// Returns an error when access is denied.
pub async fn execute(args: Args) -> Result<()> {
    let client = args.globals.client()?;
    let view = args
        .role
        .map_or_else(ViewRequirement::authenticated, ViewRequirement::role);

    let activation = client.route_guard().activate(&view);
    debug!(state = ?activation.current(), "guard activated");

    let state = activation.settled().await;
    match (&state, state.navigation()) {
        (GuardState::Authorized, _) => {
            println!("authorized");
            Ok(())
        }
        (GuardState::Unauthorized(denial), Some(navigation)) => {
            bail!(
                "denied ({denial:?}), redirect to {}",
                client.config().route(navigation)
            )
        }
        _ => bail!("access could not be decided"),
    }
}
