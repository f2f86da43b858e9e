//! Client SDK for remote identity verification flows.
//!
//! Re-exports [`verifykit_core`].

pub use verifykit_core::*;

/// Result of the SDK operations that are not part of the verification screens.
pub type VerifyKitResult<T, E = VerifyKitError> = std::result::Result<T, E>;
