//! Block implementation for the ledger
//!
//! A block carries one encrypted device event, the author's public key and
//! signature, and the hash linking it to its predecessor. The hash is computed
//! once at construction; fields are only readable afterwards.

use crate::crypto::{canonical_hash, verify_signature, EncryptedPayload, KeyPair};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `prev_hash` of the genesis block
pub const GENESIS_PREV_HASH: &str = "0";

/// Block validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BlockError {
    #[error("Invalid index: expected {expected}, got {got}")]
    InvalidIndex { expected: u64, got: u64 },
    #[error("Previous hash does not match the preceding block")]
    InvalidPreviousHash,
    #[error("Stored hash does not match block contents")]
    InvalidBlockHash,
    #[error("Signature does not verify against the author key")]
    InvalidSignature,
}

/// Fields covered by the block hash, in hashing order
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashedFields<'a> {
    index: u64,
    timestamp: &'a str,
    prev_hash: &'a str,
    encrypted_payload: &'a EncryptedPayload,
    #[serde(rename = "authorPublicKeyPem")]
    author_public_key: &'a str,
    signature: &'a str,
    nonce: u64,
}

/// Fields covered by the author's signature, in hashing order
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedFields<'a> {
    index: u64,
    timestamp: &'a str,
    prev_hash: &'a str,
    encrypted_payload: &'a EncryptedPayload,
    nonce: u64,
}

/// A block in the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    index: u64,
    /// ISO-8601 UTC, kept verbatim so every node hashes the same bytes
    timestamp: String,
    prev_hash: String,
    encrypted_payload: EncryptedPayload,
    #[serde(rename = "authorPublicKeyPem", alias = "authorPublicKey")]
    author_public_key: String,
    /// Base64 DER ECDSA signature over the signed content
    signature: String,
    #[serde(default)]
    nonce: u64,
    hash: String,
}

impl Block {
    /// Build a block from its parts and compute its hash
    pub fn new(
        index: u64,
        timestamp: String,
        prev_hash: String,
        encrypted_payload: EncryptedPayload,
        author_public_key: String,
        signature: String,
        nonce: u64,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            prev_hash,
            encrypted_payload,
            author_public_key,
            signature,
            nonce,
            hash: String::new(),
        };
        block.hash = block.calculate_hash();
        block
    }

    /// Timestamp the payload now, sign it with `author` and build the block
    pub fn signed(
        index: u64,
        prev_hash: String,
        encrypted_payload: EncryptedPayload,
        author: &KeyPair,
    ) -> Self {
        let timestamp = now_timestamp();
        let content =
            Self::compute_signed_content(index, &timestamp, &prev_hash, &encrypted_payload, 0);
        let signature = author.sign(content.as_bytes());
        Self::new(
            index,
            timestamp,
            prev_hash,
            encrypted_payload,
            author.public_key_pem(),
            signature,
            0,
        )
    }

    /// Create the genesis block, self-signed by `key_pair`
    pub fn genesis(key_pair: &KeyPair) -> Self {
        Self::signed(
            0,
            GENESIS_PREV_HASH.to_string(),
            EncryptedPayload::empty(),
            key_pair,
        )
    }

    /// Digest the author signs: position and payload, without key or signature
    pub fn compute_signed_content(
        index: u64,
        timestamp: &str,
        prev_hash: &str,
        encrypted_payload: &EncryptedPayload,
        nonce: u64,
    ) -> String {
        canonical_hash(&SignedFields {
            index,
            timestamp,
            prev_hash,
            encrypted_payload,
            nonce,
        })
    }

    /// Recompute the hash over the current fields
    pub fn calculate_hash(&self) -> String {
        canonical_hash(&HashedFields {
            index: self.index,
            timestamp: &self.timestamp,
            prev_hash: &self.prev_hash,
            encrypted_payload: &self.encrypted_payload,
            author_public_key: &self.author_public_key,
            signature: &self.signature,
            nonce: self.nonce,
        })
    }

    /// The digest this block's signature must cover
    pub fn signed_content(&self) -> String {
        Self::compute_signed_content(
            self.index,
            &self.timestamp,
            &self.prev_hash,
            &self.encrypted_payload,
            self.nonce,
        )
    }

    /// Verify the block hash
    pub fn verify_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    /// Verify the signature against the embedded author key
    pub fn verify_signature(&self) -> bool {
        verify_signature(
            &self.author_public_key,
            self.signed_content().as_bytes(),
            &self.signature,
        )
    }

    /// Check linkage to `previous` (when given), hash integrity and signature
    pub fn validate(&self, previous: Option<&Block>) -> Result<(), BlockError> {
        if let Some(prev) = previous {
            if self.index != prev.index + 1 {
                return Err(BlockError::InvalidIndex {
                    expected: prev.index + 1,
                    got: self.index,
                });
            }
            if self.prev_hash != prev.hash {
                return Err(BlockError::InvalidPreviousHash);
            }
        }

        if !self.verify_hash() {
            return Err(BlockError::InvalidBlockHash);
        }

        if !self.verify_signature() {
            return Err(BlockError::InvalidSignature);
        }

        Ok(())
    }

    pub fn is_valid(&self, previous: Option<&Block>) -> bool {
        self.validate(previous).is_ok()
    }

    /// Genesis shape: index 0 pointing at the sentinel hash
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.prev_hash == GENESIS_PREV_HASH
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn prev_hash(&self) -> &str {
        &self.prev_hash
    }

    pub fn encrypted_payload(&self) -> &EncryptedPayload {
        &self.encrypted_payload
    }

    pub fn author_public_key(&self) -> &str {
        &self.author_public_key
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// Current time as ISO-8601 UTC with millisecond precision
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
