use crate::session::{
    CredentialStore, FileStorage, HttpTransport, SessionClient, SessionConfig,
};
use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc, time::Duration};

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub api_url: String,
    pub session_file: PathBuf,
    pub renewal_timeout: Duration,
    pub request_timeout: Duration,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(api_url: String) -> Self {
        Self {
            api_url,
            session_file: default_session_file(),
            renewal_timeout: SessionConfig::default().renewal_timeout(),
            request_timeout: SessionConfig::default().request_timeout(),
        }
    }

    #[must_use]
    pub fn config(&self) -> SessionConfig {
        SessionConfig::new()
            .with_api_url(self.api_url.clone())
            .with_renewal_timeout(self.renewal_timeout)
            .with_request_timeout(self.request_timeout)
    }

    /// Session client backed by the session file and a real HTTP transport.
    ///
    /// # Errors
    /// Returns an error if the session file cannot be read or the API URL is
    /// invalid.
    pub fn client(&self) -> Result<SessionClient<HttpTransport>> {
        let config = self.config();
        let storage = FileStorage::open(&self.session_file).with_context(|| {
            format!("unable to open session file {}", self.session_file.display())
        })?;
        let transport = HttpTransport::new(&config).context("unable to build HTTP client")?;
        Ok(SessionClient::new(
            config,
            Arc::new(CredentialStore::new(storage)),
            Arc::new(transport),
        ))
    }
}

/// `<config dir>/taskify/session.json`, or a file in the working directory
/// when the platform has no config dir.
#[must_use]
pub fn default_session_file() -> PathBuf {
    dirs::config_dir().map_or_else(
        || PathBuf::from(".taskify-session.json"),
        |dir| dir.join("taskify").join("session.json"),
    )
}
