//! Authenticated request pipeline.
//!
//! Flow Overview: every business call goes through [`SessionClient::execute`].
//! The request is stamped with the current access token and sent. A 401 from
//! a non-credential endpoint triggers one renewal through the shared
//! [`RefreshCoordinator`] and one replay with the new token. A request carries
//! its [`RetryState`] explicitly, so a second 401 can never start another
//! renewal; it ends the session instead. Every other response, error statuses
//! included, is handed back untouched.

use super::{
    augment::{RequestAugmenter, REQUEST_ID_HEADER},
    config::SessionConfig,
    error::{RequestError, RetryCause},
    events::{Navigation, SessionEvent, SessionEvents},
    login::AuthApi,
    refresh::RefreshCoordinator,
    route::RouteGuard,
    store::CredentialStore,
    transport::{ApiRequest, ApiResponse, Transport},
};
use reqwest::StatusCode;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn, Span};

/// How much of its renewal budget a request has used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryState {
    /// First attempt; a 401 may still trigger a renewal.
    Fresh,
    /// Already replayed after a renewal; a 401 is final.
    Replayed,
}

/// Entry point of the session core: owns the store, the coordinator and the
/// event channel and hands out the other components wired to them.
pub struct SessionClient<T> {
    config: SessionConfig,
    store: Arc<CredentialStore>,
    transport: Arc<T>,
    events: SessionEvents,
    augmenter: RequestAugmenter,
    coordinator: RefreshCoordinator<T>,
}

impl<T> Clone for SessionClient<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            transport: Arc::clone(&self.transport),
            events: self.events.clone(),
            augmenter: self.augmenter.clone(),
            coordinator: self.coordinator.clone(),
        }
    }
}

impl<T: Transport> SessionClient<T> {
    #[must_use]
    pub fn new(config: SessionConfig, store: Arc<CredentialStore>, transport: Arc<T>) -> Self {
        let events = SessionEvents::new();
        let coordinator = RefreshCoordinator::new(
            &config,
            Arc::clone(&store),
            Arc::clone(&transport),
            events.clone(),
        );
        Self {
            augmenter: RequestAugmenter::new(Arc::clone(&store)),
            config,
            store,
            transport,
            events,
            coordinator,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    #[must_use]
    pub fn coordinator(&self) -> &RefreshCoordinator<T> {
        &self.coordinator
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn auth(&self) -> AuthApi<T> {
        AuthApi::new(
            self.config.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.transport),
            self.events.clone(),
        )
    }

    #[must_use]
    pub fn route_guard(&self) -> RouteGuard<T> {
        RouteGuard::new(Arc::clone(&self.store), self.coordinator.clone())
    }

    /// Sends `request` with the current credentials, renewing and replaying
    /// once on a 401.
    ///
    /// # Errors
    /// Returns [`RequestError::RetryExhausted`] when the session could not be
    /// recovered (the store is cleared by then) and
    /// [`RequestError::Transport`] when no response was received.
    #[instrument(
        skip_all,
        fields(method = %request.method, path = %request.path, request_id = tracing::field::Empty)
    )]
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, RequestError> {
        let mut request = request;
        let mut retry = RetryState::Fresh;

        loop {
            let sent_with = self.augmenter.apply(&mut request);
            if let Some(id) = request
                .headers
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
            {
                Span::current().record("request_id", id);
            }
            let response = self.transport.send(&request).await?;

            if response.status != StatusCode::UNAUTHORIZED
                || self.config.is_auth_endpoint(&request.path)
            {
                debug!(status = %response.status, ?retry, "response delivered");
                return Ok(response);
            }

            if retry == RetryState::Replayed {
                warn!("replayed request rejected again");
                return Err(self.exhausted(RetryCause::ReplayRejected));
            }

            // Another caller may already have renewed while this request was
            // out; its token is tried before starting a renewal of our own.
            let current = self.store.access_token();
            if current.is_some() && current != sent_with {
                debug!("access token changed since send, replaying");
            } else if let Err(err) = self.coordinator.renew().await {
                return Err(self.exhausted(err.into()));
            }
            retry = RetryState::Replayed;
        }
    }

    fn exhausted(&self, cause: RetryCause) -> RequestError {
        match self.store.clear() {
            Ok(true) => {
                info!("session ended");
                self.events.emit(SessionEvent::Navigate(Navigation::Login));
            }
            Ok(false) => {}
            Err(err) => {
                error!("failed to clear credentials: {err}");
                self.events.emit(SessionEvent::Navigate(Navigation::Login));
            }
        }
        RequestError::RetryExhausted {
            navigation: Navigation::Login,
            cause,
        }
    }
}
