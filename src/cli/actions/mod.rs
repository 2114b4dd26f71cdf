pub mod guard;
pub mod login;
pub mod logout;
pub mod refresh;
pub mod register;
pub mod request;
pub mod status;

// Internal "interpreter" for `Action`.
mod run;

use crate::{cli::globals::GlobalArgs, session::Session};

#[derive(Debug)]
pub enum Action {
    Login(login::Args),
    Register(register::Args),
    Logout(GlobalArgs),
    Status(GlobalArgs),
    Refresh(GlobalArgs),
    Request(request::Args),
    Guard(guard::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}

fn roles_label(session: &Session) -> String {
    if session.roles.is_empty() {
        "none".to_string()
    } else {
        session.roles.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}
