//! Best-effort persistence over a platform [`KeyValueStore`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::traits::KeyValueStore;
use crate::logger::Log;

/// Wraps a platform store and absorbs its failures.
///
/// Every value is mirrored in memory. When the platform store fails, the failure is
/// logged and the in-memory copy is used instead, so a broken keychain degrades to
/// "state lost on restart" rather than to a failed verification step.
pub(crate) struct FallbackStore {
    backend: Arc<dyn KeyValueStore>,
    shadow: Mutex<HashMap<String, Option<String>>>,
    log: Log,
}

impl FallbackStore {
    pub(crate) fn new(backend: Arc<dyn KeyValueStore>, log: Log) -> Self {
        Self {
            backend,
            shadow: Mutex::new(HashMap::new()),
            log,
        }
    }

    fn remember(&self, key: &str, value: Option<String>) {
        self.shadow
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    pub(crate) fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(key.to_string()) {
            Ok(value) => {
                self.remember(key, value.clone());
                value
            }
            Err(e) => {
                self.log
                    .warn(&format!("failed to read `{key}`, using memory copy: {e}"));
                self.shadow
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(key)
                    .cloned()
                    .flatten()
            }
        }
    }

    pub(crate) fn set(&self, key: &str, value: &str) {
        self.remember(key, Some(value.to_string()));
        if let Err(e) = self.backend.set(key.to_string(), value.to_string()) {
            self.log
                .warn(&format!("failed to persist `{key}`, kept in memory only: {e}"));
        }
    }

    pub(crate) fn remove(&self, key: &str) {
        self.remember(key, None);
        if let Err(e) = self.backend.remove(key.to_string()) {
            self.log.warn(&format!("failed to remove `{key}`: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NoopLogger;
    use crate::storage::{MemoryStore, StorageError, StorageResult};

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: String) -> StorageResult<Option<String>> {
            Err(StorageError::Read("keychain locked".to_string()))
        }

        fn set(&self, _key: String, _value: String) -> StorageResult<()> {
            Err(StorageError::Write("keychain locked".to_string()))
        }

        fn remove(&self, _key: String) -> StorageResult<()> {
            Err(StorageError::Write("keychain locked".to_string()))
        }
    }

    fn log() -> Log {
        Log::new(Arc::new(NoopLogger), "test")
    }

    #[test]
    fn test_writes_through_to_backend() {
        let backend = Arc::new(MemoryStore::new());
        let store = FallbackStore::new(backend.clone(), log());
        store.set("k", "v");
        assert_eq!(backend.get("k".to_string()).unwrap(), Some("v".to_string()));
        assert_eq!(store.get("k"), Some("v".to_string()));
        store.remove("k");
        assert_eq!(backend.get("k".to_string()).unwrap(), None);
    }

    #[test]
    fn test_failures_fall_back_to_memory() {
        let store = FallbackStore::new(Arc::new(BrokenStore), log());
        assert_eq!(store.get("k"), None);
        store.set("k", "v");
        assert_eq!(store.get("k"), Some("v".to_string()));
        store.remove("k");
        assert_eq!(store.get("k"), None);
    }
}
