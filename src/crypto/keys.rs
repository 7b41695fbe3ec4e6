//! ECDSA key management for the ledger
//!
//! Provides key pair generation, signing, and verification using
//! the secp256k1 elliptic curve. Keys travel as PEM (SPKI for public keys,
//! PKCS#8 for private keys) and signatures as base64 DER, the formats other
//! ledger nodes and device clients exchange.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use pem::{EncodeConfig, LineEnding, Pem};
use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::sha256;

/// `AlgorithmIdentifier { id-ecPublicKey, secp256k1 }`
const SECP256K1_ALGORITHM: [u8; 18] = [
    0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x05, 0x2b, 0x81,
    0x04, 0x00, 0x0a,
];

/// secp256k1 curve OID as it appears in `ECPrivateKey.parameters`
const SECP256K1_CURVE_OID: [u8; 7] = [0x06, 0x05, 0x2b, 0x81, 0x04, 0x00, 0x0a];

/// `ECPrivateKey` header up to the 32-byte private key octet string
const EC_PRIVATE_KEY_PREFIX: [u8; 5] = [0x02, 0x01, 0x01, 0x04, 0x20];

const PUBLIC_KEY_TAG: &str = "PUBLIC KEY";
const PRIVATE_KEY_TAG: &str = "PRIVATE KEY";
const EC_PRIVATE_KEY_TAG: &str = "EC PRIVATE KEY";

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Malformed PEM: {0}")]
    MalformedPem(#[from] pem::PemError),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a PKCS#8 or SEC1 PEM private key
    pub fn from_private_key_pem(pem_key: &str) -> Result<Self, KeyError> {
        let parsed = pem::parse(pem_key.trim())?;
        if parsed.tag() != PRIVATE_KEY_TAG && parsed.tag() != EC_PRIVATE_KEY_TAG {
            return Err(KeyError::InvalidPrivateKey);
        }
        let der = parsed.contents();
        if parsed.tag() == PRIVATE_KEY_TAG && !contains(der, &SECP256K1_ALGORITHM) {
            return Err(KeyError::InvalidPrivateKey);
        }
        // Both encodings embed the same ECPrivateKey structure.
        let start = der
            .windows(EC_PRIVATE_KEY_PREFIX.len())
            .position(|w| w == EC_PRIVATE_KEY_PREFIX)
            .map(|pos| pos + EC_PRIVATE_KEY_PREFIX.len())
            .ok_or(KeyError::InvalidPrivateKey)?;
        let end = start + 32;
        let secret = der.get(start..end).ok_or(KeyError::InvalidPrivateKey)?;
        // Optional [0] parameters must name secp256k1
        if der.get(end) == Some(&0xa0) {
            let curve = der
                .get(end + 2..end + 2 + SECP256K1_CURVE_OID.len())
                .ok_or(KeyError::InvalidPrivateKey)?;
            if curve != SECP256K1_CURVE_OID {
                return Err(KeyError::InvalidPrivateKey);
            }
        }
        let secret_key = SecretKey::from_slice(secret).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the public key as SPKI PEM
    pub fn public_key_pem(&self) -> String {
        let point = self.public_key.serialize_uncompressed();
        let mut der = Vec::with_capacity(88);
        der.extend_from_slice(&[0x30, 0x56]);
        der.extend_from_slice(&SECP256K1_ALGORITHM);
        der.extend_from_slice(&[0x03, 0x42, 0x00]);
        der.extend_from_slice(&point);
        encode_pem(PUBLIC_KEY_TAG, der)
    }

    /// Get the private key as PKCS#8 PEM
    /// WARNING: Keep this secret!
    pub fn private_key_pem(&self) -> String {
        let point = self.public_key.serialize_uncompressed();
        let mut der = Vec::with_capacity(135);
        der.extend_from_slice(&[0x30, 0x81, 0x84, 0x02, 0x01, 0x00]);
        der.extend_from_slice(&SECP256K1_ALGORITHM);
        der.extend_from_slice(&[0x04, 0x6d, 0x30, 0x6b]);
        der.extend_from_slice(&EC_PRIVATE_KEY_PREFIX);
        der.extend_from_slice(&self.secret_key.secret_bytes());
        der.extend_from_slice(&[0xa1, 0x44, 0x03, 0x42, 0x00]);
        der.extend_from_slice(&point);
        encode_pem(PRIVATE_KEY_TAG, der)
    }

    /// Sign data, returning a base64 DER signature
    pub fn sign(&self, data: &[u8]) -> String {
        sign_message(&self.secret_key, data)
    }

    /// Verify a signature against this key pair's public key
    pub fn verify(&self, data: &[u8], signature: &str) -> bool {
        verify_with_key(&self.public_key, data, signature)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn encode_pem(tag: &str, der: Vec<u8>) -> String {
    pem::encode_config(
        &Pem::new(tag, der),
        EncodeConfig::new().set_line_ending(LineEnding::LF),
    )
}

/// Parse an SPKI PEM public key on the secp256k1 curve
pub fn public_key_from_pem(pem_key: &str) -> Result<PublicKey, KeyError> {
    let parsed = pem::parse(pem_key.trim())?;
    if parsed.tag() != PUBLIC_KEY_TAG {
        return Err(KeyError::InvalidPublicKey);
    }
    let der = parsed.contents();
    let start = der
        .windows(SECP256K1_ALGORITHM.len())
        .position(|w| w == SECP256K1_ALGORITHM)
        .map(|pos| pos + SECP256K1_ALGORITHM.len())
        .ok_or(KeyError::InvalidPublicKey)?;
    // BIT STRING: tag, length, unused-bits byte, then the SEC1 point
    match der.get(start..start + 3) {
        Some([0x03, _, 0x00]) => {}
        _ => return Err(KeyError::InvalidPublicKey),
    }
    PublicKey::from_slice(&der[start + 3..]).map_err(|_| KeyError::InvalidPublicKey)
}

/// Sign `data` (hashed with SHA-256) with a secret key
pub fn sign_message(secret_key: &SecretKey, data: &[u8]) -> String {
    let secp = Secp256k1::new();
    let message = digest_message(data);
    let signature = secp.sign_ecdsa(&message, secret_key);
    STANDARD.encode(signature.serialize_der().to_vec())
}

/// Sign `data` with a PEM private key
pub fn sign_with_pem(private_key_pem: &str, data: &[u8]) -> Result<String, KeyError> {
    Ok(KeyPair::from_private_key_pem(private_key_pem)?.sign(data))
}

/// Verify a base64 DER signature over `data` against a PEM public key.
///
/// Returns false for any malformed key, encoding or signature.
pub fn verify_signature(public_key_pem: &str, data: &[u8], signature: &str) -> bool {
    match public_key_from_pem(public_key_pem) {
        Ok(public_key) => verify_with_key(&public_key, data, signature),
        Err(_) => false,
    }
}

fn verify_with_key(public_key: &PublicKey, data: &[u8], signature: &str) -> bool {
    let Ok(der) = STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut sig) = Signature::from_der_lax(&der) else {
        return false;
    };
    // libsecp256k1 only accepts low-S; other signers may emit high-S.
    sig.normalize_s();

    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&digest_message(data), &sig, public_key).is_ok()
}

fn digest_message(data: &[u8]) -> Message {
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&sha256(data));
    Message::from_digest(digest)
}
