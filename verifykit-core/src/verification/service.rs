use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::documents::{DocumentFile, DocumentSubmitRequest};
use super::listener::{ListenerId, Listeners, VerificationListener};
use super::scan_process::{DocumentAction, DocumentRecord, DocumentType, ScanProcess};
use super::state::{
    EndstateReason, ProcessingItem, VerificationError, VerificationResult, VerificationStateData,
};
use super::status::{translate, NextStep, RemoteStatus};
use crate::activation::ActivationSdk;
use crate::api::ApiClient;
use crate::defaults::VerifyKitConfig;
use crate::error::VerifyKitError;
use crate::logger::{Log, Logger};
use crate::storage::{resolve_instance_id, scan_process_key, FallbackStore, KeyValueStore};
use crate::transport::Transport;
use crate::utils::parse_iso8601_duration;

#[derive(Debug, Default)]
struct Inner {
    last_status: Option<RemoteStatus>,
    scan_process: Option<ScanProcess>,
}

impl Inner {
    fn process_id(&self) -> Result<String, VerifyKitError> {
        self.last_status
            .as_ref()
            .map(|status| status.process_id.clone())
            .ok_or(VerifyKitError::MissingStatus)
    }
}

/// Drives the user through the identity verification.
///
/// Every operation returns the screen to show next and broadcasts it to the
/// registered listeners. Calls on one instance are serialized: a second call waits
/// until the first one has finished.
pub struct VerificationService {
    api: ApiClient,
    activation: Arc<dyn ActivationSdk>,
    store: FallbackStore,
    scan_key: String,
    inner: Mutex<Inner>,
    listeners: Listeners,
    log: Log,
}

impl VerificationService {
    /// Creates the service and restores the scan process persisted by a previous run.
    ///
    /// A persisted scan process that cannot be parsed is discarded.
    #[must_use]
    pub fn new(
        config: &VerifyKitConfig,
        transport: Arc<dyn Transport>,
        activation: Arc<dyn ActivationSdk>,
        store: Arc<dyn KeyValueStore>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let log = Log::new(logger, "verification");
        let store = FallbackStore::new(store, log.clone());
        let instance_id = resolve_instance_id(config.instance_id.as_deref(), &store);
        let scan_key = scan_process_key(&instance_id);

        let scan_process = store
            .get(&scan_key)
            .and_then(|cache| match ScanProcess::restore(&cache) {
                Ok(process) => Some(process),
                Err(e) => {
                    log.warn(&format!("discarding cached scan process: {e}"));
                    store.remove(&scan_key);
                    None
                }
            });

        Self {
            api: ApiClient::new(transport, config.accept_language.clone(), log.clone())
                .with_submit_timeout(config.submit_timeout()),
            activation,
            store,
            scan_key,
            inner: Mutex::new(Inner {
                last_status: None,
                scan_process,
            }),
            listeners: Listeners::default(),
            log,
        }
    }

    /// Subscribes `listener` to state and activation changes.
    pub fn add_listener(&self, listener: Arc<dyn VerificationListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    /// Unsubscribes a listener. Returns `false` when it was not subscribed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Sets the `Accept-Language` of subsequent calls.
    pub fn set_accept_language(&self, language: String) {
        self.api.set_accept_language(language);
    }

    /// Status received by the last successful [`Self::get_status`] call.
    pub async fn current_status(&self) -> Option<RemoteStatus> {
        self.inner.lock().await.last_status.clone()
    }

    /// Documents the user selected, with the latest server results.
    pub async fn scan_process(&self) -> Option<ScanProcess> {
        self.inner.lock().await.scan_process.clone()
    }

    /// Fetches the verification status and derives the screen to show.
    ///
    /// # Errors
    ///
    /// Fails when the service cannot be reached, rejects the call or reports a
    /// phase and status combination this client does not know.
    pub async fn get_status(&self) -> VerificationResult<VerificationStateData> {
        let result = {
            let mut inner = self.inner.lock().await;
            self.refresh_status(&mut inner).await
        };
        self.publish(result).await
    }

    async fn refresh_status(
        &self,
        inner: &mut Inner,
    ) -> Result<VerificationStateData, VerifyKitError> {
        let status = match self.api.identity_status().await {
            Ok(status) => status,
            Err(e) => {
                inner.last_status = None;
                return Err(e);
            }
        };
        if status.status.clears_scan_cache() && inner.scan_process.is_some() {
            self.log
                .debug("status is terminal for the scan, clearing cached scan process");
            self.save_scan_process(inner, None);
        }
        let step = translate(&status);
        let process_id = status.process_id.clone();
        inner.last_status = Some(status);

        let state = match step? {
            NextStep::Intro => VerificationStateData::Intro,
            NextStep::DocumentScan => {
                let records = self.api.documents_status(&process_id).await?;
                self.document_scan_state(inner, &records)
            }
            NextStep::PresenceCheck => VerificationStateData::PresenceCheck,
            NextStep::StatusCheck(reason) => VerificationStateData::Processing {
                item: reason.into(),
            },
            NextStep::Otp => VerificationStateData::Otp {
                remaining_attempts: None,
            },
            NextStep::Failed => VerificationStateData::Failed,
            NextStep::Rejected => VerificationStateData::Endstate {
                reason: EndstateReason::Rejected,
            },
            NextStep::Success => VerificationStateData::Success,
        };
        Ok(state)
    }

    fn document_scan_state(
        &self,
        inner: &mut Inner,
        records: &[DocumentRecord],
    ) -> VerificationStateData {
        let Some(process) = inner.scan_process.as_mut() else {
            if records.is_empty() {
                return VerificationStateData::DocumentsToScanSelect;
            }
            self.log
                .error("server reports uploaded documents but no scan process is cached");
            return VerificationStateData::Failed;
        };
        process.feed(records);

        let actions: Vec<Option<DocumentAction>> =
            records.iter().map(|record| record.status.action()).collect();
        let needs_rescan = actions.contains(&Some(DocumentAction::Error))
            || records.iter().any(DocumentRecord::has_errors);

        if needs_rescan
            || records.is_empty()
            || actions.iter().all(|a| *a == Some(DocumentAction::Proceed))
        {
            VerificationStateData::ScanDocument {
                process: process.clone(),
            }
        } else if actions.contains(&Some(DocumentAction::Wait)) {
            VerificationStateData::Processing {
                item: ProcessingItem::DocumentVerification,
            }
        } else {
            self.log
                .error("unexpected document states, cannot decide how to continue");
            VerificationStateData::Failed
        }
    }

    /// Fetches the consent the user has to approve.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::MissingStatus`] before the first successful status call,
    /// or a failure of the service call.
    pub async fn get_consent_text(&self) -> VerificationResult<VerificationStateData> {
        let result = {
            let inner = self.inner.lock().await;
            match inner.process_id() {
                Ok(process_id) => self
                    .api
                    .consent_text(&process_id)
                    .await
                    .map(|html| VerificationStateData::Consent { html }),
                Err(e) => Err(e),
            }
        };
        self.publish(result).await
    }

    /// Approves the consent and starts the verification.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::MissingStatus`] before the first successful status call,
    /// or a failure of either service call.
    pub async fn approve_consent(&self) -> VerificationResult<VerificationStateData> {
        let result = {
            let mut inner = self.inner.lock().await;
            self.approve_and_start(&mut inner).await
        };
        self.publish(result).await
    }

    async fn approve_and_start(
        &self,
        inner: &mut Inner,
    ) -> Result<VerificationStateData, VerifyKitError> {
        let process_id = inner.process_id()?;
        self.api.approve_consent(&process_id).await?;
        self.api.start_verification(&process_id).await?;
        self.save_scan_process(inner, None);
        self.log.info("verification started");
        Ok(VerificationStateData::DocumentsToScanSelect)
    }

    /// Initializes the document scanning SDK with its `challenge`.
    ///
    /// Returns the token the SDK needs to finish its initialization.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::MissingStatus`] before the first successful status call,
    /// or a failure of the service call.
    pub async fn init_document_scan_sdk(&self, challenge: &str) -> VerificationResult<String> {
        let result = {
            let inner = self.inner.lock().await;
            match inner.process_id() {
                Ok(process_id) => self.api.init_scan_sdk(&process_id, challenge).await,
                Err(e) => Err(e),
            }
        };
        self.settle(result).await
    }

    /// Starts a scan process for the documents the user picked.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::InvalidInput`] when `types` is empty.
    pub async fn set_selected_document_types(
        &self,
        types: &[DocumentType],
    ) -> VerificationResult<VerificationStateData> {
        let result = if types.is_empty() {
            Err(VerifyKitError::InvalidInput {
                attribute: "types".to_string(),
                reason: "at least one document type is required".to_string(),
            })
        } else {
            let process = ScanProcess::new(types);
            let mut inner = self.inner.lock().await;
            self.save_scan_process(&mut inner, Some(process.clone()));
            Ok(VerificationStateData::ScanDocument { process })
        };
        self.publish(result).await
    }

    /// Uploads scanned document images.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::MissingStatus`] before the first successful status call,
    /// [`VerifyKitError::InvalidInput`] for an empty upload, or a failure of the
    /// service call.
    pub async fn submit_documents(
        &self,
        files: &[DocumentFile],
    ) -> VerificationResult<VerificationStateData> {
        let result = {
            let inner = self.inner.lock().await;
            self.upload(&inner, files).await
        };
        self.publish(result).await
    }

    async fn upload(
        &self,
        inner: &Inner,
        files: &[DocumentFile],
    ) -> Result<VerificationStateData, VerifyKitError> {
        let process_id = inner.process_id()?;
        let request = DocumentSubmitRequest::build(&process_id, files)?;
        self.log.info(&format!(
            "uploading {} document file(s), resubmit: {}",
            request.documents.len(),
            request.resubmit
        ));
        self.api.submit_documents(&request).await?;
        Ok(VerificationStateData::Processing {
            item: ProcessingItem::DocumentUpload,
        })
    }

    /// Initializes the presence check.
    ///
    /// Returns the session attributes for the presence check SDK.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::MissingStatus`] before the first successful status call,
    /// or a failure of the service call.
    pub async fn init_presence_check(&self) -> VerificationResult<HashMap<String, String>> {
        let result = {
            let inner = self.inner.lock().await;
            match inner.process_id() {
                Ok(process_id) => self
                    .api
                    .init_presence_check(&process_id)
                    .await
                    .map(|session| session.into_string_attributes()),
                Err(e) => Err(e),
            }
        };
        self.settle(result).await
    }

    /// Tells the server the presence check finished on the device.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::MissingStatus`] before the first successful status call,
    /// or a failure of the service call.
    pub async fn submit_presence_check(&self) -> VerificationResult<VerificationStateData> {
        let result = {
            let inner = self.inner.lock().await;
            match inner.process_id() {
                Ok(process_id) => self
                    .api
                    .submit_presence_check(&process_id)
                    .await
                    .map(|()| VerificationStateData::Processing {
                        item: ProcessingItem::VerifyingPresence,
                    }),
                Err(e) => Err(e),
            }
        };
        self.publish(result).await
    }

    /// Resets the verification on the server so the user can start over.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::MissingStatus`] before the first successful status call,
    /// or a failure of the service call.
    pub async fn restart_verification(&self) -> VerificationResult<VerificationStateData> {
        let result = {
            let mut inner = self.inner.lock().await;
            self.cleanup(&mut inner).await
        };
        self.publish(result).await
    }

    /// Cancels the whole onboarding process this verification belongs to.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::MissingStatus`] before the first successful status call,
    /// or a failure of the service call.
    pub async fn cancel_whole_process(&self) -> VerificationResult<()> {
        let result = {
            let mut inner = self.inner.lock().await;
            self.cancel(&mut inner).await
        };
        self.settle(result).await
    }

    async fn cleanup(&self, inner: &mut Inner) -> Result<VerificationStateData, VerifyKitError> {
        let process_id = inner.process_id()?;
        self.api.cleanup_verification(&process_id).await?;
        self.save_scan_process(inner, None);
        Ok(VerificationStateData::Intro)
    }

    async fn cancel(&self, inner: &mut Inner) -> Result<(), VerifyKitError> {
        let process_id = inner.process_id()?;
        self.api.cancel_onboarding(&process_id).await?;
        self.save_scan_process(inner, None);
        inner.last_status = None;
        self.log.info("whole process cancelled");
        Ok(())
    }

    /// Verifies the OTP the user entered.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::OtpExhausted`] when the code was wrong and no attempt is
    /// left or it expired, [`VerifyKitError::MissingStatus`] before the first
    /// successful status call, or a failure of the service call.
    pub async fn verify_otp(&self, otp: &str) -> VerificationResult<VerificationStateData> {
        let result = {
            let inner = self.inner.lock().await;
            match inner.process_id() {
                Ok(process_id) => self.api.verify_otp(&process_id, otp).await.and_then(|r| {
                    if r.verified {
                        Ok(VerificationStateData::Processing {
                            item: ProcessingItem::Other,
                        })
                    } else if r.remaining_attempts > 0 && !r.expired {
                        Ok(VerificationStateData::Otp {
                            remaining_attempts: Some(r.remaining_attempts),
                        })
                    } else {
                        Err(VerifyKitError::OtpExhausted)
                    }
                }),
                Err(e) => Err(e),
            }
        };
        self.publish(result).await
    }

    /// Sends a new OTP to the user.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::MissingStatus`] before the first successful status call,
    /// or a failure of the service call.
    pub async fn resend_otp(&self) -> VerificationResult<()> {
        let result = {
            let inner = self.inner.lock().await;
            match inner.process_id() {
                Ok(process_id) => self.api.resend_otp(&process_id).await,
                Err(e) => Err(e),
            }
        };
        self.settle(result).await
    }

    /// Reads the current OTP from the server. Only demo servers expose it.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::MissingStatus`] before the first successful status call,
    /// or a failure of the service call.
    pub async fn otp_detail(&self) -> VerificationResult<String> {
        let result = {
            let inner = self.inner.lock().await;
            match inner.process_id() {
                Ok(process_id) => self.api.otp_detail(&process_id).await,
                Err(e) => Err(e),
            }
        };
        self.settle(result).await
    }

    /// Seconds the user has to wait before another OTP can be resent.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::MissingStatus`] before the first successful status call,
    /// [`VerifyKitError::InvalidResponse`] when the status carries no usable period.
    pub async fn otp_resend_period_seconds(&self) -> VerificationResult<u64> {
        let inner = self.inner.lock().await;
        let status = inner
            .last_status
            .as_ref()
            .ok_or(VerifyKitError::MissingStatus)?;
        let period = status.config.otp_resend_period.as_deref().ok_or_else(|| {
            VerifyKitError::InvalidResponse("status carries no `otpResendPeriod`".to_string())
        })?;
        parse_iso8601_duration(period).map_err(|e| {
            VerificationError::new(VerifyKitError::InvalidResponse(e.to_string()))
        })
    }

    fn save_scan_process(&self, inner: &mut Inner, process: Option<ScanProcess>) {
        match &process {
            Some(process) => self.store.set(&self.scan_key, &process.serialize()),
            None => self.store.remove(&self.scan_key),
        }
        inner.scan_process = process;
    }

    async fn publish(
        &self,
        result: Result<VerificationStateData, VerifyKitError>,
    ) -> VerificationResult<VerificationStateData> {
        let state = self.settle(result).await?;
        self.log.debug(&format!("state changed: {state:?}"));
        self.listeners.state_changed(&state);
        Ok(state)
    }

    async fn settle<T>(&self, result: Result<T, VerifyKitError>) -> VerificationResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => Err(self.recover(e).await),
        }
    }

    /// Maps a failed call to the error surfaced to the caller. Failures the server
    /// answered are checked against the activation status first.
    async fn recover(&self, error: VerifyKitError) -> VerificationError {
        let reconcile = error.is_auth_failure()
            || matches!(
                error,
                VerifyKitError::Server { .. } | VerifyKitError::InvalidResponse(_)
            );
        if !reconcile {
            self.log.warn(&format!("operation failed: {error}"));
            return VerificationError::new(error);
        }

        match self.activation.fetch_activation_status().await {
            Ok(status) if !status.active => {
                self.log
                    .warn(&format!("activation is no longer active after: {error}"));
                self.listeners.activation_status_changed(&status);
                VerificationError::new(VerifyKitError::ActivationNotActive)
            }
            Ok(_) => {
                self.log.warn(&format!("operation failed: {error}"));
                VerificationError::new(error)
            }
            Err(e) => {
                self.log
                    .error(&format!("activation status unavailable ({e}) after: {error}"));
                VerificationError::new(error)
            }
        }
    }
}

impl std::fmt::Debug for VerificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationService")
            .field("scan_key", &self.scan_key)
            .finish_non_exhaustive()
    }
}
