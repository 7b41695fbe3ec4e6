//! Per-device symmetric keys
//!
//! Each device id maps to one AES-256 key, generated the first time the node
//! encrypts for that device. Keys are node-local: a peer that adopts this
//! node's chain cannot decrypt its payloads, and a restart loses every key.

use std::sync::Arc;

use super::{KeyValueStore, MemoryStore};
use crate::crypto::EncryptionKey;

/// Device id -> encryption key registry
#[derive(Clone)]
pub struct DeviceKeyStore {
    store: Arc<dyn KeyValueStore<String, EncryptionKey>>,
}

impl DeviceKeyStore {
    /// Registry backed by process memory
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn KeyValueStore<String, EncryptionKey>>) -> Self {
        Self { store }
    }

    /// Key for `device_id`, if this node has ever encrypted for it
    pub fn get(&self, device_id: &str) -> Option<EncryptionKey> {
        self.store.get(&device_id.to_string())
    }

    /// Key for `device_id`, generating one on first use
    pub fn ensure(&self, device_id: &str) -> EncryptionKey {
        self.store
            .get_or_create(device_id.to_string(), &EncryptionKey::generate)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Default for DeviceKeyStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_created_lazily() {
        let keys = DeviceKeyStore::in_memory();
        assert!(keys.get("kettle").is_none());

        let first = keys.ensure("kettle");
        let second = keys.ensure("kettle");
        assert_eq!(first, second);
        assert_eq!(keys.get("kettle"), Some(first));
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn test_devices_get_distinct_keys() {
        let keys = DeviceKeyStore::in_memory();
        assert_ne!(keys.ensure("kettle"), keys.ensure("lock"));
    }
}
