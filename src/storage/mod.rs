//! Key-value stores for node-local registries
//!
//! Device keys and wallets live behind [`KeyValueStore`] so the node logic
//! never assumes how they are kept. The only implementation shipped is
//! [`MemoryStore`]: everything is lost when the process exits.

pub mod device_keys;
pub mod memory;

pub use device_keys::DeviceKeyStore;
pub use memory::MemoryStore;

/// A thread-safe map with create-if-absent semantics
pub trait KeyValueStore<K, V>: Send + Sync {
    /// Get a copy of the value stored under `key`
    fn get(&self, key: &K) -> Option<V>;

    /// Store `value` under `key`, replacing any previous value
    fn put(&self, key: K, value: V);

    /// Store `value` only if `key` is vacant; returns whether it was stored
    fn insert_if_absent(&self, key: K, value: V) -> bool;

    /// Get the value under `key`, storing `create()` first if it is vacant
    fn get_or_create(&self, key: K, create: &dyn Fn() -> V) -> V;

    fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
