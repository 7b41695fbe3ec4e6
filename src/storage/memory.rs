//! In-memory implementation of the KeyValueStore trait.
//!
//! All data is lost when the store is dropped. Thread-safe via RwLock.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};

use super::KeyValueStore;

/// In-memory store implementation.
pub struct MemoryStore<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> MemoryStore<K, V> {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for MemoryStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// A panicking writer cannot leave a HashMap half-updated, so poisoned locks
// are recovered rather than propagated.
impl<K, V> KeyValueStore<K, V> for MemoryStore<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.get(key).cloned()
    }

    fn put(&self, key: K, value: V) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.insert(key, value);
    }

    fn insert_if_absent(&self, key: K, value: V) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.contains_key(&key) {
            return false;
        }
        inner.insert(key, value);
        true
    }

    fn get_or_create(&self, key: K, create: &dyn Fn() -> V) -> V {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.entry(key).or_insert_with(create).clone()
    }

    fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_put_and_get() {
        let store: MemoryStore<String, u32> = MemoryStore::new();
        assert!(store.is_empty());

        store.put("a".to_string(), 1);
        store.put("a".to_string(), 2);
        assert_eq!(store.get(&"a".to_string()), Some(2));
        assert_eq!(store.len(), 1);
        assert!(store.get(&"b".to_string()).is_none());
    }

    #[test]
    fn test_insert_if_absent() {
        let store: MemoryStore<String, u32> = MemoryStore::new();
        assert!(store.insert_if_absent("a".to_string(), 1));
        assert!(!store.insert_if_absent("a".to_string(), 2));
        assert_eq!(store.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn test_get_or_create_runs_once() {
        let store: MemoryStore<String, u32> = MemoryStore::new();
        assert_eq!(store.get_or_create("k".to_string(), &|| 7), 7);
        assert_eq!(store.get_or_create("k".to_string(), &|| 9), 7);
    }

    #[test]
    fn test_concurrent_get_or_create_agrees() {
        let store: Arc<MemoryStore<String, u64>> = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.get_or_create("shared".to_string(), &|| i))
            })
            .collect();

        let values: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(values.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.len(), 1);
    }
}
