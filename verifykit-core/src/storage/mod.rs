//! Persistence of process state: platform key-value store and helpers.

pub mod error;
mod fallback;
mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use traits::KeyValueStore;

pub(crate) use fallback::FallbackStore;

/// Storage key of the instance id generated when the host configures none.
pub(crate) const INSTANCE_ID_KEY: &str = "verifykit.instanceId";

/// Resolves the per-installation id namespacing the other keys.
///
/// A configured id wins. Otherwise the id generated by an earlier run is read back,
/// and the first run generates and persists one.
pub(crate) fn resolve_instance_id(configured: Option<&str>, store: &FallbackStore) -> String {
    if let Some(id) = configured {
        return id.to_string();
    }
    if let Some(id) = store.get(INSTANCE_ID_KEY) {
        return id;
    }
    let id = uuid::Uuid::new_v4().to_string();
    store.set(INSTANCE_ID_KEY, &id);
    id
}

/// Storage key of the cached scan process.
pub(crate) fn scan_process_key(instance_id: &str) -> String {
    format!("{instance_id}.verification.scanProcess")
}

/// Storage key of the onboarding process id.
pub(crate) fn onboarding_process_key(instance_id: &str) -> String {
    format!("{instance_id}.onboarding.processId")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::logger::{Log, NoopLogger};

    fn store(backend: &Arc<MemoryStore>) -> FallbackStore {
        FallbackStore::new(backend.clone(), Log::new(Arc::new(NoopLogger), "test"))
    }

    #[test]
    fn test_generated_instance_id_is_persisted() {
        let backend = Arc::new(MemoryStore::new());

        let first = resolve_instance_id(None, &store(&backend));
        let second = resolve_instance_id(None, &store(&backend));

        assert_eq!(first, second);
        assert_eq!(
            backend.get(INSTANCE_ID_KEY.to_string()).unwrap(),
            Some(first)
        );
    }

    #[test]
    fn test_configured_instance_id_wins() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .set(INSTANCE_ID_KEY.to_string(), "generated".to_string())
            .unwrap();

        assert_eq!(
            resolve_instance_id(Some("device-1"), &store(&backend)),
            "device-1"
        );
    }
}
