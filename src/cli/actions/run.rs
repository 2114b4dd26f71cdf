use crate::cli::actions::{guard, login, logout, refresh, register, request, status, Action};
use anyhow::Result;

/// Execute the provided action.
// This is the single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Login(args) => login::execute(args).await,
        Action::Register(args) => register::execute(args).await,
        Action::Logout(globals) => logout::execute(&globals),
        Action::Status(globals) => status::execute(&globals),
        Action::Refresh(globals) => refresh::execute(&globals).await,
        Action::Request(args) => request::execute(args).await,
        Action::Guard(args) => guard::execute(args).await,
    }
}
