//! Interface to the host's activation SDK (device enrollment and its status).

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::error::VerifyKitError;

/// Snapshot of the device activation as reported by the activation SDK.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActivationStatus {
    /// Whether the activation can still authenticate requests.
    pub active: bool,
    /// Server-side activation flags (e.g. `VERIFICATION_PENDING`).
    pub flags: BTreeSet<String>,
}

/// Identity attributes used to create an activation from a finished onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationPayload {
    /// Onboarding process the activation belongs to.
    pub process_id: String,
    /// Activation OTP delivered to the user.
    pub otp_code: String,
    /// Kind of credentials the activation is created from.
    pub credentials_type: String,
}

impl ActivationPayload {
    /// Credentials type sent for onboarding-based activations.
    pub const ONBOARDING_CREDENTIALS: &'static str = "ONBOARDING";

    /// Identity attributes in the form the activation SDK expects.
    #[must_use]
    pub fn to_attributes(&self) -> HashMap<String, String> {
        HashMap::from([
            ("processId".to_string(), self.process_id.clone()),
            ("otpCode".to_string(), self.otp_code.clone()),
            ("credentialsType".to_string(), self.credentials_type.clone()),
        ])
    }
}

/// Successful activation creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationResult {
    /// Fingerprint the user can compare with the one shown by the server.
    pub activation_fingerprint: String,
    /// Custom attributes returned by the server.
    pub custom_attributes: HashMap<String, String>,
}

/// Activation creation failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct ActivationCreationError {
    /// Human readable reason.
    pub reason: String,
    /// Whether creating the activation again with the same onboarding process
    /// can still succeed (e.g. the user mistyped the OTP but attempts remain).
    pub retry_allowed: bool,
}

impl From<ActivationCreationError> for VerifyKitError {
    fn from(error: ActivationCreationError) -> Self {
        Self::ActivationFailed {
            reason: error.reason,
            retry_allowed: error.retry_allowed,
        }
    }
}

/// The activation SDK the host application embeds.
#[async_trait]
pub trait ActivationSdk: Send + Sync {
    /// Whether the SDK is in a state where a new activation can be created.
    fn can_start_activation(&self) -> bool;

    /// Queries the current activation status from the server.
    ///
    /// # Errors
    ///
    /// Returns an error when the status cannot be fetched.
    async fn fetch_activation_status(&self) -> Result<ActivationStatus, VerifyKitError>;

    /// Creates an activation from `payload`, naming the device `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationCreationError`] when the server refuses the activation.
    async fn create_activation(
        &self,
        payload: &ActivationPayload,
        name: &str,
    ) -> Result<ActivationResult, ActivationCreationError>;
}
