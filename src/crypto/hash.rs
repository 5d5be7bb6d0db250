//! Canonical hashing of audit records
//!
//! Deterministic digests over JSON values:
//! - RFC 8785 JSON Canonicalization Scheme (JCS) for the byte form
//! - SHA-256 over the canonical UTF-8 bytes
//! - Big-endian length prefixes for derived key material
//!
//! # RFC 8785 Compliance
//!
//! Canonicalization goes through `serde_json_canonicalizer`, so two values
//! that differ only in key order (at any depth) yield the same digest:
//! - Deterministic key ordering (lexicographic UTF-8)
//! - ES6-compatible number serialization (handles floats, -0, etc.)
//! - Proper Unicode handling

use serde::Serialize;
use sha2::{Digest as _, Sha256};

use crate::domain::{Digest, Hash256};

/// Failure to produce the canonical byte form of a value
#[derive(Debug, thiserror::Error)]
pub enum CanonicalizationError {
    #[error("value cannot be represented as JSON: {0}")]
    Unrepresentable(String),

    #[error("canonical serialization failed: {0}")]
    Canonicalizer(String),
}

// ============================================================================
// Binary Encoding Helpers
// ============================================================================

/// Encode a u32 as 4 bytes big-endian
#[inline]
pub fn u32_be(n: u32) -> [u8; 4] {
    n.to_be_bytes()
}

/// Encode a string as length-prefixed UTF-8 bytes
/// Format: U32_BE(len) || UTF8_bytes
pub fn encode_string(s: &str) -> Vec<u8> {
    let utf8_bytes = s.as_bytes();
    let mut result = Vec::with_capacity(4 + utf8_bytes.len());
    result.extend_from_slice(&u32_be(utf8_bytes.len() as u32));
    result.extend_from_slice(utf8_bytes);
    result
}

// ============================================================================
// Canonical JSON (RFC 8785 JCS)
// ============================================================================

/// Convert a JSON value to its canonical string representation per RFC 8785.
///
/// - Keys sorted at every level (lexicographic UTF-8)
/// - No extra whitespace
/// - Numbers normalized per ES6/RFC 8785 rules
/// - Strings escaped per RFC 8259
pub fn canonicalize_json(value: &serde_json::Value) -> Result<String, CanonicalizationError> {
    serde_json_canonicalizer::to_string(value)
        .map_err(|e| CanonicalizationError::Canonicalizer(e.to_string()))
}

/// SHA-256 of raw bytes
pub fn sha256(data: &[u8]) -> Digest {
    let hash: Hash256 = Sha256::digest(data).into();
    Digest::from_bytes(hash)
}

/// Digest of a JSON value: `SHA256(JCS(value))`
pub fn digest(value: &serde_json::Value) -> Result<Digest, CanonicalizationError> {
    let canonical = canonicalize_json(value)?;
    Ok(sha256(canonical.as_bytes()))
}

/// Digest of any serializable value, going through its JSON form first.
pub fn digest_serializable<T: Serialize>(value: &T) -> Result<Digest, CanonicalizationError> {
    let json = serde_json::to_value(value)
        .map_err(|e| CanonicalizationError::Unrepresentable(e.to_string()))?;
    digest(&json)
}
