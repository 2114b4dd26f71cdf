//! Scripted transport for unit tests: answers from a closure, records every
//! request and can hold requests to one path until released.

use super::{
    error::TransportError,
    transport::{ApiRequest, ApiResponse, Transport},
};
use reqwest::{header::AUTHORIZATION, StatusCode};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;

type Handler = dyn Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync;

pub(crate) struct ScriptedTransport {
    handler: Box<Handler>,
    gate: Option<(String, Arc<Semaphore>)>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(
        handler: impl Fn(&ApiRequest) -> Result<ApiResponse, TransportError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            gate: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Holds requests to `path` until [`ScriptedTransport::release`].
    pub(crate) fn gated(mut self, path: &str) -> Self {
        self.gate = Some((path.to_string(), Arc::new(Semaphore::new(0))));
        self
    }

    pub(crate) fn release(&self) {
        if let Some((_, gate)) = &self.gate {
            gate.add_permits(1024);
        }
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn count(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.path == path)
            .count()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some((path, gate)) = &self.gate {
            if *path == request.path {
                let _permit = gate
                    .acquire()
                    .await
                    .map_err(|err| TransportError::Network(err.to_string()))?;
            }
        }

        (self.handler)(request)
    }
}

pub(crate) fn json(
    status: StatusCode,
    body: serde_json::Value,
) -> Result<ApiResponse, TransportError> {
    Ok(ApiResponse::new(status, body.to_string()))
}

/// Bearer token carried by a request, if any.
pub(crate) fn bearer(request: &ApiRequest) -> Option<String> {
    request
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(ToString::to_string)
}
