//! Onboarding flows driven through `OnboardingService` against a scripted service.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use verifykit_core::storage::{KeyValueStore, MemoryStore};
use verifykit_core::verification::DocumentType;
use verifykit_core::{
    ActivationCreationError, ActivationPayload, ActivationResult, Endpoint, OnboardingService,
    OnboardingStatus, VerificationService, VerifyKitError,
};

use common::{
    config, default_config, logger, onboarding_key, store, stored, MockActivation,
    ScriptedTransport, PROCESS_ID,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    client_number: &'static str,
    birth_date: &'static str,
}

const CREDENTIALS: Credentials = Credentials {
    client_number: "12345678",
    birth_date: "1970-01-01",
};

fn service(
    transport: &Arc<ScriptedTransport>,
    activation: &Arc<MockActivation>,
    store: &Arc<MemoryStore>,
) -> OnboardingService {
    OnboardingService::new(
        &config(),
        transport.clone(),
        activation.clone(),
        store.clone(),
        logger(),
    )
}

fn with_process() -> (Arc<ScriptedTransport>, Arc<MockActivation>, Arc<MemoryStore>) {
    let store = store();
    store
        .set(onboarding_key(), PROCESS_ID.to_string())
        .unwrap();
    (ScriptedTransport::new(), MockActivation::new(), store)
}

fn refusal(retry_allowed: bool) -> ActivationCreationError {
    ActivationCreationError {
        reason: "wrong code".to_string(),
        retry_allowed,
    }
}

#[tokio::test]
async fn test_start_persists_the_process() {
    let (transport, activation, store) = (ScriptedTransport::new(), MockActivation::new(), store());
    transport.respond(
        Endpoint::OnboardingStart,
        json!({ "processId": PROCESS_ID, "onboardingStatus": "ACTIVATION_IN_PROGRESS" }),
    );
    let onboarding = service(&transport, &activation, &store);
    assert!(!onboarding.has_active_process().await);

    let status = onboarding.start(&CREDENTIALS).await.unwrap();

    assert_eq!(status, OnboardingStatus::ActivationInProgress);
    assert_eq!(
        transport.requests()[0].body["identification"]["clientNumber"],
        "12345678"
    );
    assert_eq!(
        stored(&store, &onboarding_key()).as_deref(),
        Some(PROCESS_ID)
    );

    let err = onboarding.start(&CREDENTIALS).await.unwrap_err();
    assert!(matches!(err, VerifyKitError::ProcessInProgress));

    let restarted = service(&transport, &activation, &store);
    assert!(restarted.has_active_process().await);
    transport.assert_drained();
}

#[tokio::test]
async fn test_status_maps_the_remote_status() {
    let (transport, activation, store) = with_process();
    transport.respond(
        Endpoint::OnboardingStatus,
        json!({ "processId": PROCESS_ID, "onboardingStatus": "FINISHED" }),
    );

    let onboarding = service(&transport, &activation, &store);

    assert_eq!(
        onboarding.status().await.unwrap(),
        OnboardingStatus::Finished
    );
    assert_eq!(transport.requests()[0].body["processId"], PROCESS_ID);
}

#[tokio::test]
async fn test_operations_require_a_process() {
    let (transport, activation, store) = (ScriptedTransport::new(), MockActivation::new(), store());
    let onboarding = service(&transport, &activation, &store);

    assert!(matches!(
        onboarding.status().await,
        Err(VerifyKitError::MissingProcessId)
    ));
    assert!(matches!(
        onboarding.activate("1234", "phone").await,
        Err(VerifyKitError::MissingProcessId)
    ));
    assert_eq!(onboarding.create_activation_payload("1234").await.unwrap(), None);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_forced_cancel_forgets_the_process() {
    let (transport, activation, store) = with_process();
    transport
        .fail(
            Endpoint::OnboardingCancel,
            VerifyKitError::Offline("no route".to_string()),
        )
        .fail(
            Endpoint::OnboardingCancel,
            VerifyKitError::Offline("no route".to_string()),
        );
    let onboarding = service(&transport, &activation, &store);

    assert!(assert_err!(onboarding.cancel(false).await).is_offline());
    assert!(onboarding.has_active_process().await);

    assert_ok!(onboarding.cancel(true).await);
    assert!(!onboarding.has_active_process().await);
    assert_eq!(stored(&store, &onboarding_key()), None);
}

#[tokio::test]
async fn test_otp_passthroughs() {
    let (transport, activation, store) = with_process();
    transport
        .respond(Endpoint::OnboardingOtpResend, json!({}))
        .respond(Endpoint::OnboardingOtpDetail, json!({ "otpCode": "9876" }));
    let onboarding = service(&transport, &activation, &store);

    assert_ok!(onboarding.resend_otp().await);
    assert_eq!(onboarding.get_otp().await.unwrap(), "9876");
    assert_eq!(transport.requests()[1].body["otpType"], "ACTIVATION");
}

#[tokio::test]
async fn test_activation_payload() {
    let (transport, activation, store) = with_process();
    let onboarding = service(&transport, &activation, &store);

    let payload = onboarding
        .create_activation_payload("1234")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        payload,
        ActivationPayload {
            process_id: PROCESS_ID.to_string(),
            otp_code: "1234".to_string(),
            credentials_type: "ONBOARDING".to_string(),
        }
    );
}

#[tokio::test]
async fn test_successful_activation_forgets_the_process() {
    let (transport, activation, store) = with_process();
    activation.will_create(Ok(ActivationResult {
        activation_fingerprint: "fp".to_string(),
        custom_attributes: HashMap::new(),
    }));
    let onboarding = service(&transport, &activation, &store);

    let result = onboarding.activate("1234", "My phone").await.unwrap();

    assert_eq!(result.activation_fingerprint, "fp");
    assert!(!onboarding.has_active_process().await);
    let created_with = activation.created_with.lock().unwrap();
    assert_eq!(created_with[0].0.otp_code, "1234");
    assert_eq!(created_with[0].1, "My phone");
}

#[tokio::test]
async fn test_refused_activation_keeps_the_process_while_retry_is_allowed() {
    let (transport, activation, store) = with_process();
    let onboarding = service(&transport, &activation, &store);

    activation.will_create(Err(refusal(true)));
    let err = onboarding.activate("0000", "phone").await.unwrap_err();
    assert!(matches!(
        err,
        VerifyKitError::ActivationFailed {
            retry_allowed: true,
            ..
        }
    ));
    assert!(onboarding.has_active_process().await);

    activation.will_create(Err(refusal(false)));
    assert_err!(onboarding.activate("0000", "phone").await);
    assert!(!onboarding.has_active_process().await);
    assert_eq!(stored(&store, &onboarding_key()), None);
}

#[tokio::test]
async fn test_process_is_dropped_when_activation_cannot_start() {
    let (transport, activation, store) = with_process();
    let onboarding = service(&transport, &activation, &store);
    activation.set_can_start(false);

    let err = onboarding.resend_otp().await.unwrap_err();

    assert!(matches!(err, VerifyKitError::CannotStartActivation));
    assert_eq!(stored(&store, &onboarding_key()), None);
    activation.set_can_start(true);
    assert!(!onboarding.has_active_process().await);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_process_survives_restart_with_default_config() {
    let store = store();
    let transport = ScriptedTransport::new();
    transport.respond(
        Endpoint::OnboardingStart,
        json!({ "processId": PROCESS_ID, "onboardingStatus": "ACTIVATION_IN_PROGRESS" }),
    );
    let first = OnboardingService::new(
        &default_config(),
        transport.clone(),
        MockActivation::new(),
        store.clone(),
        logger(),
    );
    first.start(&CREDENTIALS).await.unwrap();

    let restarted = OnboardingService::new(
        &default_config(),
        ScriptedTransport::new(),
        MockActivation::new(),
        store.clone(),
        logger(),
    );
    assert!(restarted.has_active_process().await);

    // Both orchestrators namespace their keys with the same generated id.
    let verification = VerificationService::new(
        &default_config(),
        ScriptedTransport::new(),
        MockActivation::new(),
        store.clone(),
        logger(),
    );
    verification
        .set_selected_document_types(&[DocumentType::Passport])
        .await
        .unwrap();
    let instance_id = stored(&store, "verifykit.instanceId").unwrap();
    assert_eq!(
        stored(&store, &format!("{instance_id}.onboarding.processId")).as_deref(),
        Some(PROCESS_ID)
    );
    assert_eq!(
        stored(&store, &format!("{instance_id}.verification.scanProcess")).as_deref(),
        Some("V1:PASSPORT")
    );
}
