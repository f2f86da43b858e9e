//! Common test utilities shared across integration tests.
#![allow(dead_code, reason = "each test binary uses a subset of the helpers")]
#![allow(missing_docs, reason = "shared test helpers, not public API")]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use verifykit_core::storage::{KeyValueStore, MemoryStore};
use verifykit_core::verification::{VerificationListener, VerificationStateData};
use verifykit_core::{
    ActivationCreationError, ActivationPayload, ActivationResult, ActivationSdk, ActivationStatus,
    ApiRequest, Endpoint, Environment, NoopLogger, Transport, VerifyKitConfig, VerifyKitError,
};

pub const INSTANCE_ID: &str = "test-device";
pub const PROCESS_ID: &str = "process-1";

/// Staging configuration pinned to [`INSTANCE_ID`].
pub fn config() -> VerifyKitConfig {
    let mut config = VerifyKitConfig::from_environment(&Environment::Staging);
    config.instance_id = Some(INSTANCE_ID.to_string());
    config
}

/// Configuration as a host gets it out of the box, without an instance id.
pub fn default_config() -> VerifyKitConfig {
    VerifyKitConfig::from_environment(&Environment::Staging)
}

pub fn logger() -> Arc<NoopLogger> {
    Arc::new(NoopLogger)
}

pub fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// Storage key of the scan process under [`INSTANCE_ID`].
pub fn scan_key() -> String {
    format!("{INSTANCE_ID}.verification.scanProcess")
}

pub fn onboarding_key() -> String {
    format!("{INSTANCE_ID}.onboarding.processId")
}

/// Raw value persisted under `key`.
pub fn stored(store: &MemoryStore, key: &str) -> Option<String> {
    store.get(key.to_string()).unwrap()
}

/// Response object of the identity status endpoint.
pub fn status(phase: Option<&str>, status: &str) -> Value {
    json!({
        "processId": PROCESS_ID,
        "identityVerificationStatus": status,
        "identityVerificationPhase": phase,
        "config": { "otpResendPeriod": "PT1M30S" },
    })
}

/// One record of the document status endpoint.
pub fn document(api_type: &str, side: &str, status: &str, errors: Option<&[&str]>) -> Value {
    json!({
        "id": format!("{api_type}-{side}"),
        "type": api_type,
        "side": side,
        "status": status,
        "errors": errors,
    })
}

pub fn documents(records: Vec<Value>) -> Value {
    json!({ "status": "IN_PROGRESS", "documents": records })
}

/// Business error answered by the server with `code`.
pub fn server_error(code: &str) -> VerifyKitError {
    VerifyKitError::Server {
        code: code.parse().unwrap(),
        message: "refused".to_string(),
        http_status: Some(400),
    }
}

/// Transport answering calls from a script, in order.
///
/// Every scripted answer names the endpoint it expects, so a call out of sequence
/// fails the test.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<(Endpoint, Result<Value, VerifyKitError>)>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, endpoint: Endpoint, response: Value) -> &Self {
        self.script
            .lock()
            .unwrap()
            .push_back((endpoint, Ok(response)));
        self
    }

    pub fn fail(&self, endpoint: Endpoint, error: VerifyKitError) -> &Self {
        self.script.lock().unwrap().push_back((endpoint, Err(error)));
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.requests().iter().map(|r| r.endpoint).collect()
    }

    pub fn assert_drained(&self) {
        let script = self.script.lock().unwrap();
        assert!(script.is_empty(), "unused responses: {:?}", script.len());
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, request: ApiRequest) -> Result<Value, VerifyKitError> {
        let (endpoint, response) = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected call to {}", request.endpoint));
        assert_eq!(request.endpoint, endpoint, "calls out of sequence");
        self.requests.lock().unwrap().push(request);
        response
    }
}

/// Activation SDK with a configurable state.
pub struct MockActivation {
    pub can_start: AtomicBool,
    pub active: AtomicBool,
    pub status_queries: AtomicUsize,
    pub creation: Mutex<Option<Result<ActivationResult, ActivationCreationError>>>,
    pub created_with: Mutex<Vec<(ActivationPayload, String)>>,
}

impl MockActivation {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            can_start: AtomicBool::new(true),
            active: AtomicBool::new(true),
            status_queries: AtomicUsize::new(0),
            creation: Mutex::new(None),
            created_with: Mutex::new(Vec::new()),
        })
    }

    pub fn status_queries(&self) -> usize {
        self.status_queries.load(Ordering::SeqCst)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn set_can_start(&self, can_start: bool) {
        self.can_start.store(can_start, Ordering::SeqCst);
    }

    pub fn will_create(&self, result: Result<ActivationResult, ActivationCreationError>) {
        *self.creation.lock().unwrap() = Some(result);
    }
}

#[async_trait]
impl ActivationSdk for MockActivation {
    fn can_start_activation(&self) -> bool {
        self.can_start.load(Ordering::SeqCst)
    }

    async fn fetch_activation_status(&self) -> Result<ActivationStatus, VerifyKitError> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        Ok(ActivationStatus {
            active: self.active.load(Ordering::SeqCst),
            flags: std::collections::BTreeSet::new(),
        })
    }

    async fn create_activation(
        &self,
        payload: &ActivationPayload,
        name: &str,
    ) -> Result<ActivationResult, ActivationCreationError> {
        self.created_with
            .lock()
            .unwrap()
            .push((payload.clone(), name.to_string()));
        self.creation
            .lock()
            .unwrap()
            .take()
            .expect("no activation result scripted")
    }
}

/// Listener recording every notification.
#[derive(Default)]
pub struct RecordingListener {
    pub states: Mutex<Vec<VerificationStateData>>,
    pub activation_changes: Mutex<Vec<ActivationStatus>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn states(&self) -> Vec<VerificationStateData> {
        self.states.lock().unwrap().clone()
    }

    pub fn activation_changes(&self) -> Vec<ActivationStatus> {
        self.activation_changes.lock().unwrap().clone()
    }
}

impl VerificationListener for RecordingListener {
    fn state_changed(&self, state: &VerificationStateData) {
        self.states.lock().unwrap().push(state.clone());
    }

    fn activation_status_changed(&self, status: &ActivationStatus) {
        self.activation_changes.lock().unwrap().push(status.clone());
    }
}
