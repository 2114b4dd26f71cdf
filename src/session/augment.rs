use super::{credentials::Token, store::CredentialStore, transport::ApiRequest};
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::warn;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Stamps outgoing requests with the current access token.
///
/// Runs before every send, including replays, so a replay always carries the
/// token that is current at the moment it leaves.
#[derive(Clone)]
pub struct RequestAugmenter {
    store: Arc<CredentialStore>,
}

impl RequestAugmenter {
    #[must_use]
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self { store }
    }

    /// Sets (or removes) the bearer header and returns the token attached.
    ///
    /// Any `Authorization` header already on the request is dropped first so
    /// a stale credential is never sent when the store is empty.
    pub fn apply(&self, request: &mut ApiRequest) -> Option<Token> {
        request.headers.remove(AUTHORIZATION);
        ensure_request_id(request);

        let token = self.store.access_token()?;
        match HeaderValue::from_str(&format!("Bearer {}", token.expose_secret())) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.headers.insert(AUTHORIZATION, value);
                Some(token)
            }
            Err(_) => {
                warn!("stored access token is not a valid header value; sending unauthenticated");
                None
            }
        }
    }
}

/// Gives the request a stable correlation id; kept as-is on replays.
fn ensure_request_id(request: &mut ApiRequest) {
    if request.headers.contains_key(REQUEST_ID_HEADER) {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&uuid::Uuid::new_v4().to_string()) {
        request
            .headers
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
}
