//! Session core.
//!
//! Flow Overview:
//! - [`AuthApi::login`] writes a fresh session into the [`CredentialStore`].
//! - [`SessionClient::execute`] stamps each request through the
//!   [`RequestAugmenter`] and, on a 401, renews once through the shared
//!   [`RefreshCoordinator`] before replaying.
//! - [`RouteGuard::activate`] decides whether a protected view may render,
//!   restoring the session from the refresh token when only that is left.
//! - Renewals, sign-outs and redirect intents are published as
//!   [`SessionEvent`]s; the host application performs the navigation.

pub mod augment;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod guard;
pub mod login;
pub mod refresh;
pub mod route;
pub mod store;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use self::{
    augment::RequestAugmenter,
    config::SessionConfig,
    credentials::{Session, Token},
    error::{AuthError, RenewalError, RequestError, RetryCause, StoreError, TransportError},
    events::{Navigation, SessionEvent, SessionEvents},
    guard::{RetryState, SessionClient},
    login::AuthApi,
    refresh::RefreshCoordinator,
    route::{Denial, GuardActivation, GuardState, RouteGuard, ViewRequirement},
    store::{CredentialStore, FileStorage, MemoryStorage, StorageBackend},
    transport::{ApiRequest, ApiResponse, HttpTransport, Transport},
};
