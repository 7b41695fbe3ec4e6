//! Authenticated symmetric encryption for device payloads
//!
//! AES-256-GCM with a fresh 96-bit nonce per message. The ciphertext, nonce
//! and 128-bit tag are base64-encoded separately so the envelope can be
//! stored in a block as plain strings.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Nonce length in bytes
pub const IV_LEN: usize = 12;

/// Authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// Errors from sealing or opening an envelope
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("encryption failed")]
    Encryption,
    /// Wrong key, tampered ciphertext or corrupted tag
    #[error("decryption failed: wrong key or tampered payload")]
    Decryption,
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("plaintext is not valid UTF-8")]
    InvalidUtf8,
}

/// A 256-bit AES key
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Generate a new random key
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Ciphertext envelope carried by a block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub ciphertext: String,
    pub iv: String,
    pub tag: String,
}

impl EncryptedPayload {
    /// The empty envelope used by the genesis block
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when every part is present, i.e. the envelope can be opened
    pub fn is_complete(&self) -> bool {
        !self.ciphertext.is_empty() && !self.iv.is_empty() && !self.tag.is_empty()
    }
}

/// Encrypt `plaintext` under `key` with a fresh random nonce
pub fn encrypt(plaintext: &str, key: &EncryptionKey) -> Result<EncryptedPayload, CipherError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let sealed = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|_| CipherError::Encryption)?;
    let split = sealed
        .len()
        .checked_sub(TAG_LEN)
        .ok_or(CipherError::Encryption)?;
    let (ciphertext, tag) = sealed.split_at(split);

    Ok(EncryptedPayload {
        ciphertext: STANDARD.encode(ciphertext),
        iv: STANDARD.encode(iv),
        tag: STANDARD.encode(tag),
    })
}

/// Open an envelope with `key`
pub fn decrypt(envelope: &EncryptedPayload, key: &EncryptionKey) -> Result<String, CipherError> {
    let iv = decode_part("iv", &envelope.iv)?;
    let tag = decode_part("tag", &envelope.tag)?;
    let mut sealed = decode_part("ciphertext", &envelope.ciphertext)?;

    if iv.len() != IV_LEN {
        return Err(CipherError::MalformedEnvelope(format!(
            "iv must be {} bytes, got {}",
            IV_LEN,
            iv.len()
        )));
    }
    if tag.len() != TAG_LEN {
        return Err(CipherError::MalformedEnvelope(format!(
            "tag must be {} bytes, got {}",
            TAG_LEN,
            tag.len()
        )));
    }

    sealed.extend_from_slice(&tag);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), sealed.as_slice())
        .map_err(|_| CipherError::Decryption)?;

    String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
}

fn decode_part(name: &str, value: &str) -> Result<Vec<u8>, CipherError> {
    STANDARD
        .decode(value)
        .map_err(|e| CipherError::MalformedEnvelope(format!("{}: {}", name, e)))
}
