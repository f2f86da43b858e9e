use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Value};

use super::ApiClient;
use crate::error::VerifyKitError;
use crate::transport::Endpoint;
use crate::verification::{DocumentRecord, DocumentSubmitRequest, RemoteStatus};

const CONSENT_TYPE: &str = "GDPR";
const SDK_INIT_TOKEN: &str = "sdk-init-token";
const SDK_INIT_RESPONSE: &str = "sdk-init-response";
const USER_VERIFICATION_OTP: &str = "USER_VERIFICATION";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsentResponse {
    consent_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentStatusResponse {
    #[serde(default)]
    documents: Vec<DocumentRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitSdkResponse {
    #[serde(default)]
    attributes: HashMap<String, Value>,
}

/// Attributes needed to start the presence check provider's SDK.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PresenceCheckSession {
    #[serde(default)]
    pub session_attributes: HashMap<String, Value>,
}

impl PresenceCheckSession {
    /// Session attributes as plain strings. Non-string values are kept as JSON text.
    pub(crate) fn into_string_attributes(self) -> HashMap<String, String> {
        self.session_attributes
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(text) => (key, text),
                other => (key, other.to_string()),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OtpVerifyResponse {
    pub verified: bool,
    #[serde(default)]
    pub expired: bool,
    #[serde(default)]
    pub remaining_attempts: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OtpDetailResponse {
    otp_code: String,
}

/// Identity verification endpoints. All of them are signed with the activation.
impl ApiClient {
    pub(crate) async fn identity_status(&self) -> Result<RemoteStatus, VerifyKitError> {
        self.call(Endpoint::IdentityStatus, json!({})).await
    }

    pub(crate) async fn consent_text(&self, process_id: &str) -> Result<String, VerifyKitError> {
        let response: ConsentResponse = self
            .call(
                Endpoint::ConsentGet,
                json!({ "processId": process_id, "consentType": CONSENT_TYPE }),
            )
            .await?;
        Ok(response.consent_text)
    }

    pub(crate) async fn approve_consent(&self, process_id: &str) -> Result<(), VerifyKitError> {
        self.call_unit(
            Endpoint::ConsentApprove,
            json!({ "processId": process_id, "consentType": CONSENT_TYPE, "approved": true }),
        )
        .await
    }

    pub(crate) async fn start_verification(&self, process_id: &str) -> Result<(), VerifyKitError> {
        self.call_unit(Endpoint::IdentityStart, json!({ "processId": process_id }))
            .await
    }

    pub(crate) async fn cleanup_verification(
        &self,
        process_id: &str,
    ) -> Result<(), VerifyKitError> {
        self.call_unit(Endpoint::IdentityCleanup, json!({ "processId": process_id }))
            .await
    }

    pub(crate) async fn documents_status(
        &self,
        process_id: &str,
    ) -> Result<Vec<DocumentRecord>, VerifyKitError> {
        let response: DocumentStatusResponse = self
            .call(Endpoint::DocumentStatus, json!({ "processId": process_id }))
            .await?;
        Ok(response.documents)
    }

    pub(crate) async fn init_scan_sdk(
        &self,
        process_id: &str,
        challenge: &str,
    ) -> Result<String, VerifyKitError> {
        let response: InitSdkResponse = self
            .call(
                Endpoint::DocumentInitSdk,
                json!({
                    "processId": process_id,
                    "attributes": { SDK_INIT_TOKEN: challenge },
                }),
            )
            .await?;
        match response.attributes.get(SDK_INIT_RESPONSE) {
            Some(Value::String(token)) => Ok(token.clone()),
            _ => Err(VerifyKitError::InvalidResponse(format!(
                "{}: missing `{SDK_INIT_RESPONSE}` attribute",
                Endpoint::DocumentInitSdk
            ))),
        }
    }

    pub(crate) async fn submit_documents(
        &self,
        request: &DocumentSubmitRequest,
    ) -> Result<(), VerifyKitError> {
        let body = serde_json::to_value(request)?;
        self.send(Endpoint::DocumentSubmit, body, self.submit_timeout)
            .await
            .map(drop)
    }

    pub(crate) async fn init_presence_check(
        &self,
        process_id: &str,
    ) -> Result<PresenceCheckSession, VerifyKitError> {
        self.call(Endpoint::PresenceCheckInit, json!({ "processId": process_id }))
            .await
    }

    pub(crate) async fn submit_presence_check(
        &self,
        process_id: &str,
    ) -> Result<(), VerifyKitError> {
        self.call_unit(
            Endpoint::PresenceCheckSubmit,
            json!({ "processId": process_id }),
        )
        .await
    }

    pub(crate) async fn resend_otp(&self, process_id: &str) -> Result<(), VerifyKitError> {
        self.call_unit(
            Endpoint::OtpResend,
            json!({ "processId": process_id, "otpType": USER_VERIFICATION_OTP }),
        )
        .await
    }

    pub(crate) async fn verify_otp(
        &self,
        process_id: &str,
        otp: &str,
    ) -> Result<OtpVerifyResponse, VerifyKitError> {
        self.call(
            Endpoint::OtpVerify,
            json!({ "processId": process_id, "otpCode": otp }),
        )
        .await
    }

    pub(crate) async fn otp_detail(&self, process_id: &str) -> Result<String, VerifyKitError> {
        let response: OtpDetailResponse = self
            .call(
                Endpoint::OtpDetail,
                json!({ "processId": process_id, "otpType": USER_VERIFICATION_OTP }),
            )
            .await?;
        Ok(response.otp_code)
    }
}
