use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ApiClient;
use crate::error::VerifyKitError;
use crate::transport::Endpoint;

const ACTIVATION_OTP: &str = "ACTIVATION";

/// Status of an onboarding process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnboardingStatus {
    /// The activation is being created.
    ActivationInProgress,
    /// The identity is being verified.
    VerificationInProgress,
    /// The process failed.
    Failed,
    /// The process finished.
    Finished,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OnboardingProcess {
    pub process_id: String,
    pub onboarding_status: OnboardingStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OtpDetailResponse {
    otp_code: String,
}

/// Onboarding endpoints. These run before an activation exists, so they are
/// only encrypted with application keys.
impl ApiClient {
    pub(crate) async fn start_onboarding(
        &self,
        identification: Value,
    ) -> Result<OnboardingProcess, VerifyKitError> {
        self.call(
            Endpoint::OnboardingStart,
            json!({ "identification": identification }),
        )
        .await
    }

    pub(crate) async fn cancel_onboarding(&self, process_id: &str) -> Result<(), VerifyKitError> {
        self.call_unit(
            Endpoint::OnboardingCancel,
            json!({ "processId": process_id }),
        )
        .await
    }

    pub(crate) async fn onboarding_status(
        &self,
        process_id: &str,
    ) -> Result<OnboardingStatus, VerifyKitError> {
        let process: OnboardingProcess = self
            .call(
                Endpoint::OnboardingStatus,
                json!({ "processId": process_id }),
            )
            .await?;
        Ok(process.onboarding_status)
    }

    pub(crate) async fn resend_onboarding_otp(
        &self,
        process_id: &str,
    ) -> Result<(), VerifyKitError> {
        self.call_unit(
            Endpoint::OnboardingOtpResend,
            json!({ "processId": process_id }),
        )
        .await
    }

    pub(crate) async fn onboarding_otp(&self, process_id: &str) -> Result<String, VerifyKitError> {
        let response: OtpDetailResponse = self
            .call(
                Endpoint::OnboardingOtpDetail,
                json!({ "processId": process_id, "otpType": ACTIVATION_OTP }),
            )
            .await?;
        Ok(response.otp_code)
    }
}
