//! Abstract RPC surface the orchestrators talk to.
//!
//! The orchestrators never see HTTP. They hand an [`ApiRequest`] to a [`Transport`]
//! and get back the decoded `responseObject` of the service envelope, or a
//! [`VerifyKitError`] classified as offline, auth failure or business error.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use strum::{Display, IntoStaticStr};

use crate::error::VerifyKitError;

/// Security scope of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AuthScope {
    /// Encrypted with application-wide keys only. Used before an activation exists.
    Application,
    /// Signed with the activation's possession factor and encrypted with
    /// activation-scoped keys.
    Activation,
}

/// Every endpoint of the identity verification service consumed by the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Endpoint {
    /// Current identity verification status.
    IdentityStatus,
    /// Consent text to present to the user.
    ConsentGet,
    /// Records the user's consent decision.
    ConsentApprove,
    /// Starts the identity verification.
    IdentityStart,
    /// Resets the identity verification on the server.
    IdentityCleanup,
    /// Per-document upload and verification status.
    DocumentStatus,
    /// Initializes the document scanning SDK.
    DocumentInitSdk,
    /// Uploads scanned documents.
    DocumentSubmit,
    /// Initializes the presence check.
    PresenceCheckInit,
    /// Marks the presence check as done on the client.
    PresenceCheckSubmit,
    /// Resends the verification OTP.
    OtpResend,
    /// Verifies the verification OTP.
    OtpVerify,
    /// Reads the verification OTP (demo servers only).
    OtpDetail,
    /// Starts the onboarding process.
    OnboardingStart,
    /// Cancels the onboarding process.
    OnboardingCancel,
    /// Onboarding process status.
    OnboardingStatus,
    /// Resends the activation OTP.
    OnboardingOtpResend,
    /// Reads the activation OTP (demo servers only).
    OnboardingOtpDetail,
}

impl Endpoint {
    /// Path of the endpoint relative to the service base URL. Also used as the
    /// signature URI id.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::IdentityStatus => "/api/identity/status",
            Self::ConsentGet => "/api/identity/consent",
            Self::ConsentApprove => "/api/identity/consent/approve",
            Self::IdentityStart => "/api/identity/init",
            Self::IdentityCleanup => "/api/identity/cleanup",
            Self::DocumentStatus => "/api/identity/document/status",
            Self::DocumentInitSdk => "/api/identity/document/init-sdk",
            Self::DocumentSubmit => "/api/identity/document/submit",
            Self::PresenceCheckInit => "/api/identity/presence-check/init",
            Self::PresenceCheckSubmit => "/api/identity/presence-check/submit",
            Self::OtpResend => "/api/identity/otp/resend",
            Self::OtpVerify => "/api/identity/otp/verify",
            Self::OtpDetail => "/api/identity/otp/detail",
            Self::OnboardingStart => "/api/onboarding/start",
            Self::OnboardingCancel => "/api/onboarding/cleanup",
            Self::OnboardingStatus => "/api/onboarding/status",
            Self::OnboardingOtpResend => "/api/onboarding/otp/resend",
            Self::OnboardingOtpDetail => "/api/onboarding/otp/detail",
        }
    }

    /// Security scope the call must be made with.
    #[must_use]
    pub const fn scope(&self) -> AuthScope {
        match self {
            Self::OnboardingStart
            | Self::OnboardingCancel
            | Self::OnboardingStatus
            | Self::OnboardingOtpResend
            | Self::OnboardingOtpDetail => AuthScope::Application,
            _ => AuthScope::Activation,
        }
    }

    /// Whether repeating the call has no side effect on the server.
    #[must_use]
    pub const fn is_idempotent(&self) -> bool {
        matches!(
            self,
            Self::IdentityStatus
                | Self::ConsentGet
                | Self::DocumentStatus
                | Self::OtpDetail
                | Self::OnboardingStatus
                | Self::OnboardingOtpDetail
        )
    }
}

/// One call to the service.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Target endpoint.
    pub endpoint: Endpoint,
    /// Request object, wrapped into the service envelope by the transport.
    pub body: Value,
    /// Deadline overriding the transport default.
    pub timeout: Option<Duration>,
    /// `Accept-Language` value.
    pub accept_language: Option<String>,
}

impl ApiRequest {
    /// Creates a request with transport defaults.
    #[must_use]
    pub const fn new(endpoint: Endpoint, body: Value) -> Self {
        Self {
            endpoint,
            body,
            timeout: None,
            accept_language: None,
        }
    }

    /// Sets an explicit deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the `Accept-Language` value.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.accept_language = Some(language.into());
        self
    }
}

/// RPC client used by the orchestrators.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs the call and returns the decoded response object
    /// (`Value::Null` when the service sends none).
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::Offline`] for connectivity failures,
    /// [`VerifyKitError::AuthFailure`] when the request was not authorized,
    /// [`VerifyKitError::Server`] for business errors and
    /// [`VerifyKitError::InvalidResponse`] for undecodable answers.
    async fn call(&self, request: ApiRequest) -> Result<Value, VerifyKitError>;
}

/// An HTTP header as a name/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHeader {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// Body prepared for the wire together with the headers describing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Encrypted (or plain) body bytes.
    pub body: Vec<u8>,
    /// Headers required by the receiving side to open the body.
    pub headers: Vec<HttpHeader>,
}

/// Transport security collaborator (mutual authentication and payload encryption).
///
/// Implemented by the host on top of its activation SDK.
pub trait RequestSecurity: Send + Sync {
    /// Computes the authorization headers for a request to `uri_id` with `body`.
    ///
    /// # Errors
    ///
    /// Returns an error when the activation cannot sign.
    fn sign(&self, uri_id: String, body: Vec<u8>) -> Result<Vec<HttpHeader>, VerifyKitError>;

    /// Encrypts a request payload for `scope`.
    ///
    /// # Errors
    ///
    /// Returns an error when the encryptor is not available.
    fn encrypt(&self, payload: Vec<u8>, scope: AuthScope) -> Result<Envelope, VerifyKitError>;

    /// Decrypts a response payload received for `scope`.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload cannot be opened.
    fn decrypt(&self, payload: Vec<u8>, scope: AuthScope) -> Result<Vec<u8>, VerifyKitError>;
}

/// [`RequestSecurity`] that sends JSON in the clear and signs nothing.
///
/// Only meant for local development servers and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextSecurity;

impl RequestSecurity for PlaintextSecurity {
    fn sign(&self, _uri_id: String, _body: Vec<u8>) -> Result<Vec<HttpHeader>, VerifyKitError> {
        Ok(vec![])
    }

    fn encrypt(&self, payload: Vec<u8>, _scope: AuthScope) -> Result<Envelope, VerifyKitError> {
        Ok(Envelope {
            body: payload,
            headers: vec![HttpHeader {
                name: "Content-Type".to_string(),
                value: "application/json".to_string(),
            }],
        })
    }

    fn decrypt(&self, payload: Vec<u8>, _scope: AuthScope) -> Result<Vec<u8>, VerifyKitError> {
        Ok(payload)
    }
}
