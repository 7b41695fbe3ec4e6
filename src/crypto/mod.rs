//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - SHA-256 hashing over canonical record encodings
//! - ECDSA key management (secp256k1, PEM keys)
//! - AES-256-GCM payload encryption

pub mod cipher;
pub mod hash;
pub mod keys;

pub use cipher::{decrypt, encrypt, CipherError, EncryptedPayload, EncryptionKey};
pub use hash::{canonical_bytes, canonical_hash, sha256, sha256_hex};
pub use keys::{
    public_key_from_pem, sign_message, sign_with_pem, verify_signature, KeyError, KeyPair,
};
