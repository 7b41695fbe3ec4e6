//! Device Ledger: an append-only ledger of device events
//!
//! This crate provides a small replicated ledger node featuring:
//! - SHA-256 hash-linked blocks with a fixed canonical encoding
//! - ECDSA author signatures (secp256k1, PEM keys)
//! - AES-256-GCM encrypted payloads with per-device keys
//! - Longest-valid-chain replacement behind a pluggable rule
//! - Peer broadcast and pull-and-adopt synchronization over HTTP
//! - Owner-gated, node-held signing wallets
//!
//! # Example
//!
//! ```rust
//! use device_ledger::core::{Block, Ledger};
//! use device_ledger::crypto::{decrypt, encrypt, EncryptionKey, KeyPair};
//!
//! let mut ledger = Ledger::new();
//! let author = KeyPair::generate();
//! let key = EncryptionKey::generate();
//!
//! // Append one encrypted event
//! let block = Block::signed(
//!     1,
//!     ledger.latest().hash().to_string(),
//!     encrypt(r#"{"temperature":42}"#, &key).unwrap(),
//!     &author,
//! );
//! ledger.append(block).unwrap();
//!
//! assert!(ledger.is_valid());
//! let plaintext = decrypt(ledger.latest().encrypted_payload(), &key).unwrap();
//! assert_eq!(plaintext, r#"{"temperature":42}"#);
//! ```

pub mod api;
pub mod cli;
pub mod core;
pub mod crypto;
pub mod network;
pub mod storage;
pub mod wallet;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use core::{Block, ChainRule, Ledger, LongestChain};
pub use crypto::{EncryptedPayload, EncryptionKey, KeyPair};
pub use network::{Node, NodeConfig, PeerSync};
pub use storage::{DeviceKeyStore, KeyValueStore, MemoryStore};
pub use wallet::{Wallet, WalletStore};
