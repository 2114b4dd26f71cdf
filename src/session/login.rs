use super::{
    config::SessionConfig,
    credentials::{CredentialGrant, Session},
    error::AuthError,
    events::{Navigation, SessionEvent, SessionEvents},
    store::CredentialStore,
    transport::{ApiRequest, ApiResponse, Transport},
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};

/// Explicit credential operations: the only writers of a brand-new session.
pub struct AuthApi<T> {
    config: SessionConfig,
    store: Arc<CredentialStore>,
    transport: Arc<T>,
    events: SessionEvents,
}

impl<T: Transport> AuthApi<T> {
    #[must_use]
    pub fn new(
        config: SessionConfig,
        store: Arc<CredentialStore>,
        transport: Arc<T>,
        events: SessionEvents,
    ) -> Self {
        Self {
            config,
            store,
            transport,
            events,
        }
    }

    /// Exchanges a username and password for a session and stores it.
    ///
    /// # Errors
    /// Returns [`AuthError::Rejected`] when the server refuses the
    /// credentials, [`AuthError::Protocol`] when the answer carries no access
    /// token, and transport or storage failures as they happen.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Session, AuthError> {
        let request = ApiRequest::post(self.config.login_path()).with_json(json!({
            "userName": username,
            "userPassword": password.expose_secret(),
        }));
        let response = self.transport.send(&request).await?;
        ensure_success(&response)?;

        let grant: CredentialGrant = response
            .json()
            .map_err(|err| AuthError::Protocol(err.to_string()))?;
        let access_token = grant
            .access_token()
            .ok_or_else(|| AuthError::Protocol("response carries no access token".to_string()))?;

        let session = Session {
            access_token: Some(access_token),
            refresh_token: grant.refresh_token(),
            roles: grant.roles(),
        };
        self.store.set(&session)?;

        info!(
            roles = session.roles.len(),
            renewable = session.refresh_token.is_some(),
            "signed in"
        );
        self.events.emit(SessionEvent::SignedIn);
        Ok(session)
    }

    /// Creates an account. The store is never touched; the user signs in
    /// separately afterwards.
    ///
    /// # Errors
    /// Returns [`AuthError::Rejected`] on a non-success status.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<ApiResponse, AuthError> {
        let request = ApiRequest::post(self.config.register_path()).with_json(json!({
            "userName": username,
            "password": password.expose_secret(),
        }));
        let response = self.transport.send(&request).await?;
        ensure_success(&response)?;
        info!("account registered");
        Ok(response)
    }

    /// Ends the session locally. Returns whether there was one to end.
    ///
    /// # Errors
    /// Returns an error if the store could not be cleared.
    pub fn logout(&self) -> Result<bool, AuthError> {
        let ended = self.store.clear()?;
        if ended {
            info!("signed out");
            self.events.emit(SessionEvent::SignedOut);
            self.events.emit(SessionEvent::Navigate(Navigation::Login));
        }
        Ok(ended)
    }
}

fn ensure_success(response: &ApiResponse) -> Result<(), AuthError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(AuthError::Rejected {
            status: response.status.as_u16(),
            message: response.error_message(),
        })
    }
}
