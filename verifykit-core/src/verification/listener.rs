use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

use super::state::VerificationStateData;
use crate::activation::ActivationStatus;

/// Observer of the verification flow.
pub trait VerificationListener: Send + Sync {
    /// Called with the screen resulting from every successful operation.
    fn state_changed(&self, state: &VerificationStateData);

    /// Called when error recovery found the activation no longer active.
    fn activation_status_changed(&self, _status: &ActivationStatus) {}
}

/// Handle returned by `add_listener`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

/// Subscription list. Callbacks run on a snapshot, so a listener may
/// unsubscribe from within its own callback.
#[derive(Default)]
pub(crate) struct Listeners {
    entries: Mutex<Vec<(ListenerId, Arc<dyn VerificationListener>)>>,
}

impl Listeners {
    pub(crate) fn add(&self, listener: Arc<dyn VerificationListener>) -> ListenerId {
        let id = ListenerId(Uuid::new_v4());
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    fn snapshot(&self) -> Vec<Arc<dyn VerificationListener>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    pub(crate) fn state_changed(&self, state: &VerificationStateData) {
        for listener in self.snapshot() {
            listener.state_changed(state);
        }
    }

    pub(crate) fn activation_status_changed(&self, status: &ActivationStatus) {
        for listener in self.snapshot() {
            listener.activation_status_changed(status);
        }
    }
}
