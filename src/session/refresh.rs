//! Single-flight session renewal.
//!
//! Flow Overview: the first caller that needs a new access token starts one
//! exchange against the refresh endpoint; every caller arriving while it runs
//! awaits the same shared result. The exchange runs as its own task bounded by
//! the renewal timeout, so it settles even if every waiter goes away, and it
//! clears the in-flight slot itself when it does. A caller arriving after that
//! starts a fresh exchange.
//!
//! On success the store holds the new access token (and the new refresh token
//! if the server rotated it). The write only lands while the store still holds
//! the refresh token that was exchanged; a logout or login that happened
//! meanwhile is left as is. On any failure the store is cleared and a
//! navigation to the login screen is published exactly once.

use super::{
    config::SessionConfig,
    credentials::{CredentialGrant, Session, Token},
    error::RenewalError,
    events::{Navigation, SessionEvent, SessionEvents},
    store::CredentialStore,
    transport::{ApiRequest, ApiResponse, Transport},
};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use secrecy::ExposeSecret;
use serde_json::json;
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tracing::{debug, error, info, instrument, warn};

type SharedRenewal = Shared<BoxFuture<'static, Result<Session, RenewalError>>>;

struct Flight {
    id: u64,
    renewal: SharedRenewal,
}

#[derive(Default)]
struct Slot {
    next_id: u64,
    flight: Option<Flight>,
}

struct Inner<T> {
    store: Arc<CredentialStore>,
    transport: Arc<T>,
    events: SessionEvents,
    refresh_path: String,
    timeout: Duration,
    slot: Mutex<Slot>,
}

/// Owns the one renewal exchange that may be in flight at any time.
pub struct RefreshCoordinator<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for RefreshCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> RefreshCoordinator<T> {
    #[must_use]
    pub fn new(
        config: &SessionConfig,
        store: Arc<CredentialStore>,
        transport: Arc<T>,
        events: SessionEvents,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                transport,
                events,
                refresh_path: config.refresh_path().to_string(),
                timeout: config.renewal_timeout(),
                slot: Mutex::new(Slot::default()),
            }),
        }
    }

    /// Obtains a renewed session, joining the exchange already in flight if
    /// there is one.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns the shared failure of the exchange. By then the store has been
    /// cleared.
    #[instrument(skip(self))]
    pub async fn renew(&self) -> Result<Session, RenewalError> {
        let renewal = self.join_or_start()?;
        renewal.await
    }

    /// Whether an exchange is currently running.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.inner.slot().flight.is_some()
    }

    fn join_or_start(&self) -> Result<SharedRenewal, RenewalError> {
        let mut slot = self.inner.slot();

        if let Some(flight) = &slot.flight {
            debug!(flight = flight.id, "joining in-flight renewal");
            return Ok(flight.renewal.clone());
        }

        let Some(refresh_token) = self.inner.store.get().refresh_token else {
            drop(slot);
            return Err(self.inner.fail(RenewalError::NoRefreshToken, None));
        };

        let id = slot.next_id;
        slot.next_id += 1;

        // The slot lock is held until the flight is registered, so the task
        // cannot settle before it is visible to other callers.
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = inner.exchange(id, refresh_token).await;
            inner.settle(id);
            result
        });

        let renewal = async move {
            task.await.unwrap_or_else(|err| {
                Err(RenewalError::Network(format!("renewal task failed: {err}")))
            })
        }
        .boxed()
        .shared();

        debug!(flight = id, "starting renewal");
        slot.flight = Some(Flight {
            id,
            renewal: renewal.clone(),
        });
        Ok(renewal)
    }
}

impl<T: Transport> Inner<T> {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, id: u64) {
        let mut slot = self.slot();
        if slot.flight.as_ref().is_some_and(|flight| flight.id == id) {
            slot.flight = None;
        }
    }

    async fn exchange(&self, flight: u64, refresh_token: Token) -> Result<Session, RenewalError> {
        let request = ApiRequest::post(&self.refresh_path)
            .with_json(json!({ "refreshToken": refresh_token.expose_secret() }));

        let outcome = match tokio::time::timeout(self.timeout, self.transport.send(&request)).await
        {
            Ok(Ok(response)) => parse_grant(&response),
            Ok(Err(err)) => Err(RenewalError::Network(err.to_string())),
            Err(_) => Err(RenewalError::Network(format!(
                "no answer within {}ms",
                self.timeout.as_millis()
            ))),
        };

        let grant = match outcome {
            Ok(grant) => grant,
            Err(err) => return Err(self.fail(err, Some(&refresh_token))),
        };

        let Some(access_token) = grant.access_token() else {
            let err = RenewalError::Protocol("response carries no access token".to_string());
            return Err(self.fail(err, Some(&refresh_token)));
        };

        let rotated = grant.refresh_token();
        let written = self.store.replace_if_refresh(&refresh_token, |current| Session {
            access_token: Some(access_token),
            refresh_token: rotated.or(current.refresh_token),
            roles: current.roles,
        });

        match written {
            Ok(Some(session)) => {
                info!(flight, "session renewed");
                self.events.emit(SessionEvent::Renewed);
                Ok(session)
            }
            Ok(None) => self.superseded(flight),
            Err(err) => Err(self.fail(
                RenewalError::Storage(err.to_string()),
                Some(&refresh_token),
            )),
        }
    }

    /// The store moved on during the exchange (logout or a new login). Its
    /// content wins and the renewed tokens are dropped.
    fn superseded(&self, flight: u64) -> Result<Session, RenewalError> {
        let current = self.store.get();
        if current.access_token.is_some() {
            debug!(flight, "session replaced during renewal, keeping the newer one");
            Ok(current)
        } else {
            debug!(flight, "session ended during renewal, discarding renewed tokens");
            Err(RenewalError::SessionEnded)
        }
    }

    /// Ends the session after a failed renewal and hands back `err`.
    ///
    /// With `exchanged` set, a session that no longer holds that refresh token
    /// was started after the exchange and is left alone.
    fn fail(&self, err: RenewalError, exchanged: Option<&Token>) -> RenewalError {
        warn!(error = %err, "session renewal failed, clearing credentials");
        let cleared = match exchanged {
            Some(token) => self.store.clear_if_refresh(token),
            None => self.store.clear(),
        };
        match cleared {
            Ok(true) => self.events.emit(SessionEvent::Navigate(Navigation::Login)),
            Ok(false) => {}
            Err(store_err) => {
                error!("failed to clear credentials: {store_err}");
                self.events.emit(SessionEvent::Navigate(Navigation::Login));
            }
        }
        err
    }
}

fn parse_grant(response: &ApiResponse) -> Result<CredentialGrant, RenewalError> {
    if !response.is_success() {
        return Err(RenewalError::Rejected {
            status: response.status.as_u16(),
        });
    }
    response
        .json::<CredentialGrant>()
        .map_err(|err| RenewalError::Protocol(err.to_string()))
}
