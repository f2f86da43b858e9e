//! Typed requests and responses of the identity verification service.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::VerifyKitError;
use crate::logger::Log;
use crate::transport::{ApiRequest, Endpoint, Transport};

mod identity;
mod onboarding;

pub use onboarding::OnboardingStatus;

/// Shared client building [`ApiRequest`]s and decoding their responses.
pub(crate) struct ApiClient {
    transport: Arc<dyn Transport>,
    accept_language: RwLock<String>,
    submit_timeout: Option<Duration>,
    log: Log,
}

impl ApiClient {
    pub(crate) fn new(transport: Arc<dyn Transport>, accept_language: String, log: Log) -> Self {
        Self {
            transport,
            accept_language: RwLock::new(accept_language),
            submit_timeout: None,
            log,
        }
    }

    /// Deadline of the document upload. Without it the upload uses the transport default.
    pub(crate) const fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = Some(timeout);
        self
    }

    pub(crate) fn set_accept_language(&self, language: String) {
        *self
            .accept_language
            .write()
            .unwrap_or_else(PoisonError::into_inner) = language;
    }

    pub(crate) fn accept_language(&self) -> String {
        self.accept_language
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn send(
        &self,
        endpoint: Endpoint,
        body: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, VerifyKitError> {
        let mut request = ApiRequest::new(endpoint, body).with_language(self.accept_language());
        if let Some(timeout) = timeout {
            request = request.with_timeout(timeout);
        }
        self.log.debug(&format!("calling {endpoint}"));
        self.transport.call(request).await
    }

    /// Calls `endpoint` and decodes the response object into `T`.
    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        body: Value,
    ) -> Result<T, VerifyKitError> {
        let value = self.send(endpoint, body, None).await?;
        decode(endpoint, value)
    }

    /// Calls `endpoint` whose response carries no data.
    async fn call_unit(&self, endpoint: Endpoint, body: Value) -> Result<(), VerifyKitError> {
        self.send(endpoint, body, None).await.map(drop)
    }
}

fn decode<T: DeserializeOwned>(endpoint: Endpoint, value: Value) -> Result<T, VerifyKitError> {
    serde_json::from_value(value).map_err(|e| {
        VerifyKitError::InvalidResponse(format!("{endpoint}: unexpected response: {e}"))
    })
}
