use thiserror::Error;

use super::scan_process::ScanProcess;
use super::status::StatusCheckReason;
use crate::error::{ApiErrorCode, VerifyKitError};

/// What the server is busy with while the user waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingItem {
    /// No specific item.
    Other,
    /// Documents are being uploaded.
    DocumentUpload,
    /// Documents are being verified.
    DocumentVerification,
    /// Documents were accepted.
    DocumentAccepted,
    /// Final document check.
    DocumentVerificationFinal,
    /// The client is being evaluated.
    ClientVerification,
    /// The client was accepted.
    ClientAccepted,
    /// The presence check is being evaluated.
    VerifyingPresence,
}

impl From<StatusCheckReason> for ProcessingItem {
    fn from(reason: StatusCheckReason) -> Self {
        match reason {
            StatusCheckReason::Unknown => Self::Other,
            StatusCheckReason::DocumentUpload => Self::DocumentUpload,
            StatusCheckReason::DocumentVerification => Self::DocumentVerification,
            StatusCheckReason::DocumentsAccepted => Self::DocumentAccepted,
            StatusCheckReason::DocumentVerificationFinal => Self::DocumentVerificationFinal,
            StatusCheckReason::ClientVerification => Self::ClientVerification,
            StatusCheckReason::ClientAccepted => Self::ClientAccepted,
            StatusCheckReason::VerifyingPresence => Self::VerifyingPresence,
        }
    }
}

/// Why the verification ended for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndstateReason {
    /// The user was rejected.
    Rejected,
    /// Too many attempts.
    LimitReached,
    /// Any other terminal reason.
    Other,
}

/// The screen the application should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStateData {
    /// Introduction to the verification.
    Intro,
    /// Consent the user has to approve.
    Consent {
        /// Consent text as HTML.
        html: String,
    },
    /// The user picks which documents to scan.
    DocumentsToScanSelect,
    /// The user scans the next document of `process`.
    ScanDocument {
        /// Current scan process with the latest server results.
        process: ScanProcess,
    },
    /// The server is processing, poll the status again later.
    Processing {
        /// What is being processed.
        item: ProcessingItem,
    },
    /// The user performs the presence check.
    PresenceCheck,
    /// The user enters the OTP.
    Otp {
        /// Attempts left, known only after a failed verification.
        remaining_attempts: Option<u32>,
    },
    /// The verification failed and can be restarted.
    Failed,
    /// The verification ended, a new activation is needed.
    Endstate {
        /// Why it ended.
        reason: EndstateReason,
    },
    /// The user was verified.
    Success,
}

impl VerificationStateData {
    /// Screen to show after `error`, when one can be inferred without asking the
    /// server again.
    #[must_use]
    pub fn inferred_from(error: &VerifyKitError) -> Option<Self> {
        match error {
            VerifyKitError::Server { code, .. } => Self::for_code(code),
            VerifyKitError::ActivationNotActive => Some(Self::Endstate {
                reason: EndstateReason::Other,
            }),
            VerifyKitError::OtpExhausted => Some(Self::Failed),
            _ => None,
        }
    }

    fn for_code(code: &ApiErrorCode) -> Option<Self> {
        match code {
            ApiErrorCode::PresenceCheckLimitReached
            | ApiErrorCode::IdentityVerificationLimitReached
            | ApiErrorCode::OnboardingProcessLimitReached => Some(Self::Endstate {
                reason: EndstateReason::LimitReached,
            }),
            ApiErrorCode::PresenceCheckRejected | ApiErrorCode::IdentityVerificationRejected => {
                Some(Self::Endstate {
                    reason: EndstateReason::Rejected,
                })
            }
            ApiErrorCode::OnboardingOtpFailed | ApiErrorCode::ActivationExpired => {
                Some(Self::Endstate {
                    reason: EndstateReason::Other,
                })
            }
            ApiErrorCode::IdentityVerificationFailed
            | ApiErrorCode::PresenceCheckFailed
            | ApiErrorCode::OnboardingFailed => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Error of a verification operation, with the screen to show when it is known.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct VerificationError {
    /// What went wrong.
    #[source]
    pub error: VerifyKitError,
    /// Screen to show without fetching the status again.
    pub state: Option<VerificationStateData>,
}

impl VerificationError {
    /// Wraps `error`, inferring the screen from it.
    #[must_use]
    pub fn new(error: VerifyKitError) -> Self {
        let state = VerificationStateData::inferred_from(&error);
        Self { error, state }
    }
}

impl From<VerifyKitError> for VerificationError {
    fn from(error: VerifyKitError) -> Self {
        Self::new(error)
    }
}

/// Result of a verification operation.
pub type VerificationResult<T> = Result<T, VerificationError>;
