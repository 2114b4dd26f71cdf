//! Lifecycle events for the host application. The core never navigates; it
//! publishes a [`Navigation`] intent and the UI layer decides how to follow it.

use tokio::sync::broadcast;
use tracing::trace;

const EVENT_CAPACITY: usize = 32;

/// Where the host application should send the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Navigation {
    /// The session is gone; show the login screen.
    Login,
    /// The user is signed in but not allowed here; show a neutral page.
    Home,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    Renewed,
    SignedOut,
    Navigate(Navigation),
}

/// Broadcast channel shared by every component of one session.
#[derive(Clone, Debug)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event; having no subscriber is not an error.
    pub fn emit(&self, event: SessionEvent) {
        trace!(?event, "session event");
        let _ = self.tx.send(event);
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
