//! `VerifyKit` core: the client side of a remote identity verification (KYC).
//!
//! [`VerificationService`] turns the server's phase and status into the screen the
//! application should show, keeps track of the documents the user scans and
//! reconciles failures with the device activation. [`OnboardingService`] handles
//! the enrollment that precedes it.
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

mod error;
pub use error::*;

mod defaults;
pub use defaults::*;

pub mod logger;
pub use logger::{init_tracing, LogLevel, Logger, NoopLogger, TracingLogger};

mod activation;
pub use activation::*;

pub mod storage;

mod transport;
pub use transport::*;

mod http_request;
pub use http_request::HttpTransport;

mod api;
pub use api::OnboardingStatus;

pub mod verification;
pub use verification::{VerificationResult, VerificationService, VerificationStateData};

mod onboarding;
pub use onboarding::OnboardingService;

mod utils;
pub use utils::parse_iso8601_duration;
