//! Wallets: named signing keys held by the node
//!
//! A wallet lets a device client have the node sign blocks on its behalf.
//! The private key is handed to the creator once and also kept here, so
//! whoever controls the node can sign as any of its wallets.

use std::sync::Arc;

use crate::crypto::KeyPair;
use crate::core::now_timestamp;
use crate::storage::{KeyValueStore, MemoryStore};
use rand::RngCore;

/// A named keypair
#[derive(Clone)]
pub struct Wallet {
    pub wallet_id: String,
    pub label: Option<String>,
    pub created_at: String,
    key_pair: KeyPair,
}

impl Wallet {
    /// Create a wallet with a fresh key pair
    pub fn new(wallet_id: String, label: Option<String>) -> Self {
        Self {
            wallet_id,
            label,
            created_at: now_timestamp(),
            key_pair: KeyPair::generate(),
        }
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Get the wallet's public key (PEM)
    pub fn public_key(&self) -> String {
        self.key_pair.public_key_pem()
    }

    /// Get the wallet's private key (PEM)
    /// WARNING: Keep this secret!
    pub fn private_key(&self) -> String {
        self.key_pair.private_key_pem()
    }
}

/// Generate a random wallet id
pub fn generate_wallet_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("wallet-{}", hex::encode(bytes))
}

/// Wallet id -> wallet registry
#[derive(Clone)]
pub struct WalletStore {
    store: Arc<dyn KeyValueStore<String, Wallet>>,
}

impl WalletStore {
    /// Registry backed by process memory
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn KeyValueStore<String, Wallet>>) -> Self {
        Self { store }
    }

    pub fn get(&self, wallet_id: &str) -> Option<Wallet> {
        self.store.get(&wallet_id.to_string())
    }

    /// Create a wallet under `wallet_id`; `None` if the id is taken
    pub fn create(&self, wallet_id: String, label: Option<String>) -> Option<Wallet> {
        let wallet = Wallet::new(wallet_id.clone(), label);
        if self.store.insert_if_absent(wallet_id, wallet.clone()) {
            Some(wallet)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Default for WalletStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::verify_signature;

    #[test]
    fn test_wallet_keys_match() {
        let wallet = Wallet::new("w1".to_string(), Some("kitchen".to_string()));
        let restored = KeyPair::from_private_key_pem(&wallet.private_key()).unwrap();
        assert_eq!(restored.public_key_pem(), wallet.public_key());

        let signature = wallet.key_pair().sign(b"block");
        assert!(verify_signature(&wallet.public_key(), b"block", &signature));
    }

    #[test]
    fn test_create_and_lookup() {
        let wallets = WalletStore::in_memory();
        let created = wallets
            .create("w1".to_string(), Some("kitchen".to_string()))
            .unwrap();

        let loaded = wallets.get("w1").unwrap();
        assert_eq!(loaded.public_key(), created.public_key());
        assert_eq!(loaded.label.as_deref(), Some("kitchen"));
        assert!(wallets.get("w2").is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let wallets = WalletStore::in_memory();
        let first = wallets.create("w1".to_string(), None).unwrap();
        assert!(wallets.create("w1".to_string(), None).is_none());
        assert_eq!(wallets.get("w1").unwrap().public_key(), first.public_key());
        assert_eq!(wallets.len(), 1);
    }

    #[test]
    fn test_generated_ids() {
        let a = generate_wallet_id();
        assert!(a.starts_with("wallet-"));
        assert_ne!(a, generate_wallet_id());
    }
}
