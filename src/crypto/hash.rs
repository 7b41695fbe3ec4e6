//! Hashing utilities for the ledger
//!
//! Provides the SHA-256 digests used for block identity and for the
//! signed-content digest, plus the canonical serialization both are fed from.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Serializes a record into the bytes that get hashed.
///
/// Records passed here are plain structs whose field order is fixed by their
/// declaration, so two equal records always produce identical bytes. Never
/// hash a `serde_json::Value` or a map built at runtime: key order would then
/// depend on how the value was assembled.
pub fn canonical_bytes<T: Serialize>(record: &T) -> Vec<u8> {
    // Structs of strings and integers cannot fail to serialize.
    serde_json::to_vec(record).unwrap_or_default()
}

/// Hex SHA-256 of a record's canonical bytes
pub fn canonical_hash<T: Serialize>(record: &T) -> String {
    sha256_hex(&canonical_bytes(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Sample<'a> {
        index: u64,
        prev_hash: &'a str,
    }

    #[test]
    fn test_sha256() {
        let data = b"hello world";
        let hash = sha256(data);
        assert_eq!(hash.len(), 32);
        assert_eq!(
            sha256_hex(data),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_canonical_bytes_follow_declaration_order() {
        let sample = Sample {
            index: 3,
            prev_hash: "abc",
        };
        assert_eq!(
            canonical_bytes(&sample),
            br#"{"index":3,"prevHash":"abc"}"#.to_vec()
        );
    }

    #[test]
    fn test_canonical_hash_is_deterministic() {
        let a = Sample {
            index: 1,
            prev_hash: "0",
        };
        let b = Sample {
            index: 1,
            prev_hash: "0",
        };
        assert_eq!(canonical_hash(&a), canonical_hash(&b));
        assert_eq!(canonical_hash(&a).len(), 64);
    }
}
