use crate::{cli::globals::GlobalArgs, session::Session};
use anyhow::Result;
use serde_json::{json, Value};

fn summary(session: &Session, globals: &GlobalArgs) -> Value {
    json!({
        "signedIn": session.access_token.is_some(),
        "renewable": session.refresh_token.is_some(),
        "roles": session.roles,
        "apiUrl": globals.api_url,
        "sessionFile": globals.session_file.display().to_string(),
    })
}

/// Execute the status action. Token values are never printed.
/// # Errors
/// Returns an error if the session file cannot be read.
pub fn execute(globals: &GlobalArgs) -> Result<()> {
    let client = globals.client()?;
    let session = client.store().get();

    println!("{}", serde_json::to_string_pretty(&summary(&session, globals))?);
    Ok(())
}
