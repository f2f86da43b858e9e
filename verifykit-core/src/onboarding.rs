//! Enrollment that precedes the identity verification: the user identifies
//! with weak credentials, confirms an OTP and the device gets an activation.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use crate::activation::{ActivationPayload, ActivationResult, ActivationSdk};
use crate::api::{ApiClient, OnboardingStatus};
use crate::defaults::VerifyKitConfig;
use crate::error::VerifyKitError;
use crate::logger::{Log, Logger};
use crate::storage::{onboarding_process_key, resolve_instance_id, FallbackStore, KeyValueStore};
use crate::transport::Transport;

/// Onboarding process orchestrator.
///
/// The process id is persisted, so an onboarding survives an application restart.
/// Every operation first checks that the activation SDK can still create an
/// activation. When it cannot, the process is forgotten and the operation fails
/// with [`VerifyKitError::CannotStartActivation`].
pub struct OnboardingService {
    api: ApiClient,
    activation: Arc<dyn ActivationSdk>,
    store: FallbackStore,
    process_key: String,
    process_id: Mutex<Option<String>>,
    log: Log,
}

impl OnboardingService {
    /// Creates the service, restoring a process id persisted by a previous run.
    #[must_use]
    pub fn new(
        config: &VerifyKitConfig,
        transport: Arc<dyn Transport>,
        activation: Arc<dyn ActivationSdk>,
        store: Arc<dyn KeyValueStore>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let log = Log::new(logger, "onboarding");
        let store = FallbackStore::new(store, log.clone());
        let instance_id = resolve_instance_id(config.instance_id.as_deref(), &store);
        let process_key = onboarding_process_key(&instance_id);
        let process_id = store.get(&process_key);

        Self {
            api: ApiClient::new(transport, config.accept_language.clone(), log.clone()),
            activation,
            store,
            process_key,
            process_id: Mutex::new(process_id),
            log,
        }
    }

    async fn guarded(&self) -> Result<MutexGuard<'_, Option<String>>, VerifyKitError> {
        let mut process_id = self.process_id.lock().await;
        if self.activation.can_start_activation() {
            return Ok(process_id);
        }
        if process_id.is_some() {
            self.log
                .warn("activation can no longer be started, forgetting the process");
            self.save(&mut process_id, None);
        }
        Err(VerifyKitError::CannotStartActivation)
    }

    fn save(&self, slot: &mut Option<String>, process_id: Option<String>) {
        match &process_id {
            Some(id) => self.store.set(&self.process_key, id),
            None => self.store.remove(&self.process_key),
        }
        *slot = process_id;
    }

    fn require(slot: &Option<String>) -> Result<String, VerifyKitError> {
        slot.clone().ok_or(VerifyKitError::MissingProcessId)
    }

    /// Whether an onboarding process is known. It may have expired on the server.
    pub async fn has_active_process(&self) -> bool {
        self.guarded()
            .await
            .is_ok_and(|process_id| process_id.is_some())
    }

    /// Fetches the status of the onboarding process.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::MissingProcessId`] without a process, or a failure of the
    /// service call.
    pub async fn status(&self) -> Result<OnboardingStatus, VerifyKitError> {
        let slot = self.guarded().await?;
        let process_id = Self::require(&slot)?;
        self.api.onboarding_status(&process_id).await
    }

    /// Starts an onboarding process for the user identified by `credentials`.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::ProcessInProgress`] when a process already exists, or a
    /// failure of the service call.
    pub async fn start<C: Serialize + Sync>(
        &self,
        credentials: &C,
    ) -> Result<OnboardingStatus, VerifyKitError> {
        let mut slot = self.guarded().await?;
        if slot.is_some() {
            return Err(VerifyKitError::ProcessInProgress);
        }
        let identification = serde_json::to_value(credentials)?;
        let process = self.api.start_onboarding(identification).await?;
        self.log.info("onboarding process started");
        self.save(&mut slot, Some(process.process_id));
        Ok(process.onboarding_status)
    }

    /// Cancels the onboarding process.
    ///
    /// With `force`, the process is forgotten even when the server call fails.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::MissingProcessId`] without a process, or a failure of the
    /// service call when `force` is not set.
    pub async fn cancel(&self, force: bool) -> Result<(), VerifyKitError> {
        let mut slot = self.guarded().await?;
        let process_id = Self::require(&slot)?;
        match self.api.cancel_onboarding(&process_id).await {
            Ok(()) => {
                self.save(&mut slot, None);
                Ok(())
            }
            Err(e) if force => {
                self.log
                    .warn(&format!("cancel failed, forgetting the process anyway: {e}"));
                self.save(&mut slot, None);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Sends a new activation OTP to the user.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::MissingProcessId`] without a process, or a failure of the
    /// service call.
    pub async fn resend_otp(&self) -> Result<(), VerifyKitError> {
        let slot = self.guarded().await?;
        let process_id = Self::require(&slot)?;
        self.api.resend_onboarding_otp(&process_id).await
    }

    /// Reads the activation OTP from the server. Only demo servers expose it.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::MissingProcessId`] without a process, or a failure of the
    /// service call.
    pub async fn get_otp(&self) -> Result<String, VerifyKitError> {
        let slot = self.guarded().await?;
        let process_id = Self::require(&slot)?;
        self.api.onboarding_otp(&process_id).await
    }

    /// Attributes to create an activation with, `None` without a process.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::CannotStartActivation`] when the activation SDK refuses.
    pub async fn create_activation_payload(
        &self,
        otp: &str,
    ) -> Result<Option<ActivationPayload>, VerifyKitError> {
        let slot = self.guarded().await?;
        Ok(slot.as_deref().map(|process_id| payload(process_id, otp)))
    }

    /// Creates the activation from the onboarding process and the OTP.
    ///
    /// The process is forgotten once the activation exists, or when the activation
    /// SDK reports that retrying cannot succeed.
    ///
    /// # Errors
    ///
    /// [`VerifyKitError::MissingProcessId`] without a process, or
    /// [`VerifyKitError::ActivationFailed`] when the activation was refused.
    pub async fn activate(
        &self,
        otp: &str,
        name: &str,
    ) -> Result<ActivationResult, VerifyKitError> {
        let mut slot = self.guarded().await?;
        let request = payload(&Self::require(&slot)?, otp);
        match self.activation.create_activation(&request, name).await {
            Ok(result) => {
                self.log.info("activation created");
                self.save(&mut slot, None);
                Ok(result)
            }
            Err(e) => {
                if !e.retry_allowed {
                    self.log
                        .warn(&format!("activation failed for good, forgetting the process: {e}"));
                    self.save(&mut slot, None);
                }
                Err(e.into())
            }
        }
    }
}

fn payload(process_id: &str, otp: &str) -> ActivationPayload {
    ActivationPayload {
        process_id: process_id.to_string(),
        otp_code: otp.to_string(),
        credentials_type: ActivationPayload::ONBOARDING_CREDENTIALS.to_string(),
    }
}

impl std::fmt::Debug for OnboardingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnboardingService")
            .field("process_key", &self.process_key)
            .finish_non_exhaustive()
    }
}
