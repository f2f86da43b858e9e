use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::error::VerifyKitError;

/// Deployment the SDK talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    /// Pre-production service.
    Staging,
    /// Live service.
    Production,
}

impl Environment {
    /// Default base URL of the identity verification service.
    #[must_use]
    pub const fn base_url(&self) -> &'static str {
        match self {
            Self::Staging => "https://onboarding.stage.verifykit.io/enrollment-server",
            Self::Production => "https://onboarding.verifykit.io/enrollment-server",
        }
    }
}

/// SDK configuration.
///
/// Timeouts are in seconds so the structure can be loaded from JSON handed over by
/// the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyKitConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Value of the `Accept-Language` header sent with every request.
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    /// Deadline of a regular call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Deadline of the document upload, which carries large payloads.
    #[serde(default = "default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,
    /// Retries of idempotent read calls on transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-installation id namespacing persisted keys. When absent, an id is
    /// generated on the first start and kept in the key-value store.
    #[serde(default)]
    pub instance_id: Option<String>,
}

fn default_accept_language() -> String {
    "en".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    20
}

const fn default_submit_timeout_secs() -> u64 {
    120
}

const fn default_max_retries() -> u32 {
    2
}

impl VerifyKitConfig {
    /// Builds a configuration with SDK defaults for `environment`.
    #[must_use]
    pub fn from_environment(environment: &Environment) -> Self {
        Self {
            base_url: environment.base_url().to_string(),
            accept_language: default_accept_language(),
            request_timeout_secs: default_request_timeout_secs(),
            submit_timeout_secs: default_submit_timeout_secs(),
            max_retries: default_max_retries(),
            instance_id: None,
        }
    }

    /// Parses a JSON configuration. Missing optional fields take their defaults.
    ///
    /// # Errors
    /// Returns [`VerifyKitError::InvalidInput`] when the JSON is malformed or the
    /// base URL is empty.
    pub fn from_json(config: &str) -> Result<Self, VerifyKitError> {
        let parsed: Self =
            serde_json::from_str(config).map_err(|e| VerifyKitError::InvalidInput {
                attribute: "config".to_string(),
                reason: e.to_string(),
            })?;
        if parsed.base_url.trim().is_empty() {
            return Err(VerifyKitError::InvalidInput {
                attribute: "baseUrl".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(parsed)
    }

    #[must_use]
    pub(crate) const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub(crate) const fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }
}
