//! Access decisions for protected views.
//!
//! Flow Overview: activating a view reads the store. An access token
//! authorizes immediately, and a store without any token denies immediately
//! without touching the network. A refresh token alone puts the activation in
//! `Checking` while the shared renewal runs. No redirect is ever derived from
//! a non-terminal state, so a user whose session can be recovered never sees
//! the login screen flash by.

use super::{
    credentials::Session,
    events::Navigation,
    refresh::RefreshCoordinator,
    store::CredentialStore,
    transport::Transport,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Why a view was refused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Denial {
    /// No usable session.
    Unauthenticated,
    /// Signed in, but missing the role the view requires.
    Forbidden { role: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardState {
    Init,
    Checking,
    Authorized,
    Unauthorized(Denial),
}

impl GuardState {
    /// Whether the decision is final.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Authorized | Self::Unauthorized(_))
    }

    #[must_use]
    pub fn may_render(&self) -> bool {
        matches!(self, Self::Authorized)
    }

    /// Redirect the host should perform; `None` until the state is terminal.
    #[must_use]
    pub fn navigation(&self) -> Option<Navigation> {
        match self {
            Self::Unauthorized(Denial::Unauthenticated) => Some(Navigation::Login),
            Self::Unauthorized(Denial::Forbidden { .. }) => Some(Navigation::Home),
            Self::Init | Self::Checking | Self::Authorized => None,
        }
    }
}

/// What a view needs from the session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewRequirement {
    required_role: Option<String>,
}

impl ViewRequirement {
    /// Any signed-in user.
    #[must_use]
    pub fn authenticated() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self {
            required_role: Some(role.into()),
        }
    }

    #[must_use]
    pub fn required_role(&self) -> Option<&str> {
        self.required_role.as_deref()
    }

    fn decide(&self, session: &Session) -> GuardState {
        match &self.required_role {
            Some(role) if !session.has_role(role) => GuardState::Unauthorized(Denial::Forbidden {
                role: role.clone(),
            }),
            _ => GuardState::Authorized,
        }
    }
}

/// Observable decision for one view activation.
///
/// Dropping it only discards interest in the outcome; a renewal it started
/// keeps running for everyone else.
#[derive(Debug)]
pub struct GuardActivation {
    state: watch::Receiver<GuardState>,
}

impl GuardActivation {
    #[must_use]
    pub fn current(&self) -> GuardState {
        self.state.borrow().clone()
    }

    /// Waits for the terminal decision.
    pub async fn settled(mut self) -> GuardState {
        match self.state.wait_for(GuardState::is_settled).await {
            Ok(state) => GuardState::clone(&state),
            Err(_) => GuardState::Unauthorized(Denial::Unauthenticated),
        }
    }
}

pub struct RouteGuard<T> {
    store: Arc<CredentialStore>,
    coordinator: RefreshCoordinator<T>,
}

impl<T> Clone for RouteGuard<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            coordinator: self.coordinator.clone(),
        }
    }
}

impl<T: Transport> RouteGuard<T> {
    #[must_use]
    pub fn new(store: Arc<CredentialStore>, coordinator: RefreshCoordinator<T>) -> Self {
        Self { store, coordinator }
    }

    /// Starts deciding whether `view` may render. Must be called from within a
    /// Tokio runtime.
    #[must_use]
    pub fn activate(&self, view: &ViewRequirement) -> GuardActivation {
        let (tx, rx) = watch::channel(GuardState::Init);
        let session = self.store.get();

        if session.access_token.is_some() {
            tx.send_replace(view.decide(&session));
        } else if session.refresh_token.is_some() {
            tx.send_replace(GuardState::Checking);
            let coordinator = self.coordinator.clone();
            let view = view.clone();
            tokio::spawn(async move {
                let state = match coordinator.renew().await {
                    Ok(session) => view.decide(&session),
                    Err(err) => {
                        debug!("session could not be restored: {err}");
                        GuardState::Unauthorized(Denial::Unauthenticated)
                    }
                };
                // Nobody listening any more is fine.
                let _ = tx.send(state);
            });
        } else {
            tx.send_replace(GuardState::Unauthorized(Denial::Unauthenticated));
        }

        GuardActivation { state: rx }
    }

    /// Activates `view` and waits for the terminal decision.
    pub async fn check(&self, view: &ViewRequirement) -> GuardState {
        self.activate(view).settled().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::{
        config::SessionConfig,
        credentials::Token,
        events::SessionEvents,
        testing::{json, ScriptedTransport},
    };
    use reqwest::StatusCode;
    use serde_json::json as body;
    use std::time::Duration;

    const REFRESH: &str = "/users/refresh";

    struct Harness {
        guard: RouteGuard<ScriptedTransport>,
        store: Arc<CredentialStore>,
        transport: Arc<ScriptedTransport>,
    }

    fn harness(transport: ScriptedTransport, session: &Session) -> Harness {
        let store = Arc::new(CredentialStore::in_memory());
        store.set(session).unwrap();
        let transport = Arc::new(transport);
        let coordinator = RefreshCoordinator::new(
            &SessionConfig::default(),
            Arc::clone(&store),
            Arc::clone(&transport),
            SessionEvents::new(),
        );
        Harness {
            guard: RouteGuard::new(Arc::clone(&store), coordinator),
            store,
            transport,
        }
    }

    fn refresh_only() -> Session {
        Session {
            refresh_token: Some(Token::new("r1")),
            roles: ["USER".to_string()].into(),
            ..Session::default()
        }
    }

    fn issues_a2() -> ScriptedTransport {
        ScriptedTransport::new(|_| json(StatusCode::OK, body!({ "accessToken": "a2" })))
    }

    #[tokio::test]
    async fn access_token_authorizes_without_network() {
        let session = Session {
            access_token: Some(Token::new("a1")),
            ..refresh_only()
        };
        let h = harness(issues_a2(), &session);

        let activation = h.guard.activate(&ViewRequirement::authenticated());

        assert_eq!(activation.current(), GuardState::Authorized);
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn empty_store_denies_without_network() {
        let h = harness(issues_a2(), &Session::default());

        let activation = h.guard.activate(&ViewRequirement::authenticated());

        let state = activation.current();
        assert_eq!(state, GuardState::Unauthorized(Denial::Unauthenticated));
        assert_eq!(state.navigation(), Some(Navigation::Login));
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn refresh_token_alone_restores_session() {
        let h = harness(issues_a2(), &refresh_only());

        let state = h.guard.check(&ViewRequirement::authenticated()).await;

        assert_eq!(state, GuardState::Authorized);
        assert_eq!(h.store.access_token(), Some(Token::new("a2")));
        assert_eq!(h.transport.count(REFRESH), 1);
    }

    #[tokio::test]
    async fn checking_never_redirects() {
        let h = harness(issues_a2().gated(REFRESH), &refresh_only());

        let activation = h.guard.activate(&ViewRequirement::authenticated());
        for _ in 0..10 {
            tokio::task::yield_now().await;
            let state = activation.current();
            assert_eq!(state, GuardState::Checking);
            assert_eq!(state.navigation(), None);
            assert!(!state.may_render());
        }

        h.transport.release();
        assert_eq!(activation.settled().await, GuardState::Authorized);
    }

    #[tokio::test]
    async fn failed_restore_denies() {
        let transport = ScriptedTransport::new(|_| {
            json(StatusCode::UNAUTHORIZED, body!({ "error": "invalid refresh token" }))
        });
        let h = harness(transport, &refresh_only());

        let state = h.guard.check(&ViewRequirement::authenticated()).await;

        assert_eq!(state, GuardState::Unauthorized(Denial::Unauthenticated));
        assert!(h.store.get().is_empty());
    }

    #[tokio::test]
    async fn missing_role_is_forbidden() {
        let session = Session {
            access_token: Some(Token::new("a1")),
            ..refresh_only()
        };
        let h = harness(issues_a2(), &session);

        let state = h.guard.check(&ViewRequirement::role("ADMIN")).await;

        assert_eq!(
            state,
            GuardState::Unauthorized(Denial::Forbidden {
                role: "ADMIN".to_string()
            })
        );
        assert_eq!(state.navigation(), Some(Navigation::Home));
        assert_eq!(
            h.guard.check(&ViewRequirement::role("USER")).await,
            GuardState::Authorized
        );
    }

    #[tokio::test]
    async fn role_is_checked_after_restore() {
        let h = harness(issues_a2(), &refresh_only());

        let state = h.guard.check(&ViewRequirement::role("ADMIN")).await;

        assert!(matches!(
            state,
            GuardState::Unauthorized(Denial::Forbidden { .. })
        ));
        assert_eq!(h.store.access_token(), Some(Token::new("a2")));
    }

    #[tokio::test]
    async fn concurrent_activations_share_one_renewal() {
        let h = harness(issues_a2(), &refresh_only());

        let first = h.guard.activate(&ViewRequirement::authenticated());
        let second = h.guard.activate(&ViewRequirement::role("USER"));

        assert_eq!(first.settled().await, GuardState::Authorized);
        assert_eq!(second.settled().await, GuardState::Authorized);
        assert_eq!(h.transport.count(REFRESH), 1);
    }

    #[tokio::test]
    async fn dropped_activation_lets_renewal_finish() {
        let h = harness(issues_a2().gated(REFRESH), &refresh_only());

        drop(h.guard.activate(&ViewRequirement::authenticated()));
        h.transport.release();

        tokio::time::timeout(Duration::from_secs(5), async {
            while h.store.access_token().is_none() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(h.transport.count(REFRESH), 1);
    }
}
