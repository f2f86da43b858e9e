use strum::{Display, EnumString};
use thiserror::Error;

use crate::verification::{RemotePhase, RemoteStatusKind};

/// Business error codes returned by the identity verification service.
///
/// Codes the client does not know are preserved verbatim in [`ApiErrorCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    /// Generic, unspecified failure.
    ErrorGeneric,
    /// The request signature was rejected.
    PowerauthAuthFail,
    /// The request was malformed.
    InvalidRequest,
    /// The activation used to sign the request has expired.
    ActivationExpired,
    /// Onboarding of the user failed.
    OnboardingFailed,
    /// Too many onboarding processes were started.
    OnboardingProcessLimitReached,
    /// The onboarding OTP can no longer be verified.
    OnboardingOtpFailed,
    /// The identity verification failed.
    IdentityVerificationFailed,
    /// The identity verification was rejected.
    IdentityVerificationRejected,
    /// Too many identity verification attempts.
    IdentityVerificationLimitReached,
    /// The presence check failed.
    PresenceCheckFailed,
    /// The presence check was rejected.
    PresenceCheckRejected,
    /// Too many presence check attempts.
    PresenceCheckLimitReached,
    /// The provided OTP code is not valid.
    InvalidOtpCode,
    /// The server is throttling this client.
    TooManyRequests,
    /// A code not known to this client.
    #[strum(default)]
    Other(String),
}

/// Error outputs from `VerifyKit`
#[derive(Debug, Error)]
pub enum VerifyKitError {
    /// The device is offline or the service could not be reached.
    #[error("offline: {0}")]
    Offline(String),
    /// The request was not authorized by the server.
    #[error("auth_failure: {0}")]
    AuthFailure(String),
    /// The activation backing the authenticated calls is no longer active.
    #[error("activation_not_active")]
    ActivationNotActive,
    /// The server answered with a business error.
    #[error("server_error: {code} ({message})")]
    Server {
        /// Parsed business error code.
        code: ApiErrorCode,
        /// Server-provided message.
        message: String,
        /// HTTP status code, when the error came over HTTP.
        http_status: Option<u16>,
    },
    /// The server reported a phase/status combination this client does not understand.
    #[error("protocol_mismatch: unknown combination {phase:?}/{status:?}")]
    ProtocolMismatch {
        /// Reported phase.
        phase: Option<RemotePhase>,
        /// Reported status.
        status: RemoteStatusKind,
    },
    /// The locally persisted scan process could not be parsed.
    #[error("cache_format_error: {0}")]
    CacheFormat(String),
    /// No status is known yet, `get_status` must be called first.
    #[error("missing_status")]
    MissingStatus,
    /// No onboarding process is in progress.
    #[error("missing_process_id")]
    MissingProcessId,
    /// The OTP cannot be verified anymore, the process must be restarted.
    #[error("otp_exhausted")]
    OtpExhausted,
    /// An onboarding process is already in progress.
    #[error("process_in_progress")]
    ProcessInProgress,
    /// The activation SDK is in a state where no activation can be created.
    #[error("cannot_start_activation")]
    CannotStartActivation,
    /// The activation could not be created.
    #[error("activation_failed: {reason}")]
    ActivationFailed {
        /// Collaborator-provided reason.
        reason: String,
        /// Whether the same OTP may be retried.
        retry_allowed: bool,
    },
    /// The server response could not be understood.
    #[error("invalid_response: {0}")]
    InvalidResponse(String),
    /// Unexpected error serializing information
    #[error("serialization_error: {0}")]
    SerializationError(String),
    /// The presented input is not valid for the requested operation
    #[error("invalid_input: {attribute}: {reason}")]
    InvalidInput {
        /// Name of the offending input.
        attribute: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl VerifyKitError {
    /// Whether this is a plain connectivity problem.
    #[must_use]
    pub const fn is_offline(&self) -> bool {
        matches!(self, Self::Offline(_))
    }

    /// Whether the server refused to authenticate the request.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::AuthFailure(_)
                | Self::Server {
                    code: ApiErrorCode::PowerauthAuthFail,
                    ..
                }
        )
    }

    /// Business error code, when the server sent one.
    #[must_use]
    pub const fn code(&self) -> Option<&ApiErrorCode> {
        match self {
            Self::Server { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for VerifyKitError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerializationError(error.to_string())
    }
}
