//! Server status snapshot and its translation into the next step of the flow.

use serde::{Deserialize, Serialize};

use crate::error::VerifyKitError;

/// Status of the identity verification as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteStatusKind {
    /// Verification was not started yet.
    NotInitialized,
    /// The current phase is running.
    InProgress,
    /// The current phase waits for the server to finish its checks.
    VerificationPending,
    /// The current phase passed.
    Accepted,
    /// The current phase failed, the verification can be restarted.
    Failed,
    /// The verification was rejected for good.
    Rejected,
}

impl RemoteStatusKind {
    /// Whether a locally cached scan process is stale once this status is seen.
    #[must_use]
    pub const fn clears_scan_cache(&self) -> bool {
        matches!(
            self,
            Self::Failed | Self::Rejected | Self::NotInitialized | Self::Accepted
        )
    }
}

/// Phase of the identity verification as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemotePhase {
    /// Documents are being uploaded.
    DocumentUpload,
    /// The user's selfie / liveness check.
    PresenceCheck,
    /// The bank evaluates the client.
    ClientEvaluation,
    /// Uploaded documents are being verified.
    DocumentVerification,
    /// Final cross-check of the verified documents.
    DocumentVerificationFinal,
    /// The user confirms a channel with an OTP.
    OtpVerification,
    /// The verification finished.
    Completed,
}

/// Configuration the server sends along with the status.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessConfig {
    /// Minimal period between two OTP resends, as an ISO-8601 duration.
    #[serde(default)]
    pub otp_resend_period: Option<String>,
}

/// Immutable snapshot of the server-side verification state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStatus {
    /// Onboarding process this verification belongs to.
    pub process_id: String,
    /// Reported status.
    #[serde(rename = "identityVerificationStatus")]
    pub status: RemoteStatusKind,
    /// Reported phase, absent before the verification starts.
    #[serde(rename = "identityVerificationPhase", default)]
    pub phase: Option<RemotePhase>,
    /// Process configuration.
    #[serde(default)]
    pub config: ProcessConfig,
}

/// Why the user has to wait for the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCheckReason {
    /// Documents are being uploaded.
    DocumentUpload,
    /// Documents are being verified.
    DocumentVerification,
    /// The final document check is running.
    DocumentVerificationFinal,
    /// All documents were accepted.
    DocumentsAccepted,
    /// The client is being evaluated.
    ClientVerification,
    /// The client was accepted.
    ClientAccepted,
    /// The presence check result is being evaluated.
    VerifyingPresence,
    /// No specific reason.
    Unknown,
}

/// Canonical next step derived from a [`RemoteStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextStep {
    /// Show the introduction.
    Intro,
    /// Scan (more) documents.
    DocumentScan,
    /// Poll the status until the server is done.
    StatusCheck(StatusCheckReason),
    /// Run the presence check.
    PresenceCheck,
    /// Ask the user for the OTP.
    Otp,
    /// The verification failed.
    Failed,
    /// The verification was rejected.
    Rejected,
    /// The verification succeeded.
    Success,
}

/// Translates a server status into the next step of the flow.
///
/// Every (phase, status) pair maps to at most one step.
///
/// # Errors
///
/// [`VerifyKitError::ProtocolMismatch`] for any combination this client does not
/// know. This means client and server speak different protocol versions.
pub fn translate(status: &RemoteStatus) -> Result<NextStep, VerifyKitError> {
    use NextStep as N;
    use RemotePhase as P;
    use RemoteStatusKind as S;
    use StatusCheckReason as R;

    let step = match (status.phase, status.status) {
        (None, S::NotInitialized) => N::Intro,
        (None, S::Failed) => N::Failed,

        (Some(P::DocumentUpload), S::InProgress) => N::DocumentScan,
        (Some(P::DocumentUpload), S::VerificationPending) => N::StatusCheck(R::DocumentUpload),

        (Some(P::DocumentVerification), S::Accepted) => N::StatusCheck(R::DocumentsAccepted),
        (Some(P::DocumentVerification), S::InProgress) => {
            N::StatusCheck(R::DocumentVerification)
        }
        (Some(P::DocumentVerification), S::Failed) => N::Failed,
        (Some(P::DocumentVerification), S::Rejected) => N::Rejected,

        (Some(P::DocumentVerificationFinal), S::Rejected) => N::Rejected,
        (Some(P::DocumentVerificationFinal), S::Accepted) => {
            N::StatusCheck(R::DocumentsAccepted)
        }
        (Some(P::DocumentVerificationFinal), S::InProgress) => {
            N::StatusCheck(R::DocumentVerificationFinal)
        }
        (Some(P::DocumentVerificationFinal), S::Failed) => N::Failed,

        (Some(P::ClientEvaluation), S::InProgress) => N::StatusCheck(R::ClientVerification),
        (Some(P::ClientEvaluation), S::Accepted) => N::StatusCheck(R::ClientAccepted),

        (Some(P::PresenceCheck), S::NotInitialized | S::InProgress) => N::PresenceCheck,
        (Some(P::PresenceCheck), S::VerificationPending) => {
            N::StatusCheck(R::VerifyingPresence)
        }
        (Some(P::PresenceCheck), S::Failed) => N::Failed,
        (Some(P::PresenceCheck), S::Rejected) => N::Rejected,

        (Some(P::OtpVerification), S::VerificationPending) => N::Otp,

        (Some(P::Completed), S::Accepted) => N::Success,
        (Some(P::Completed), S::Failed) => N::Failed,
        (Some(P::Completed), S::Rejected) => N::Rejected,

        (phase, status) => return Err(VerifyKitError::ProtocolMismatch { phase, status }),
    };
    Ok(step)
}
