//! Identity-bound record encryption
//!
//! A record is sealed with a key derived from its creator identity and its
//! record id, so only the same `(identity, record_id)` pair opens it again.
//!
//! Ciphertext layout (standard base64 of):
//!
//! ```text
//! MAGIC "APC1" || U32_BE(kdf_iterations) || salt(16) || nonce(12) || AES-256-GCM(ct || tag)
//! ```
//!
//! - Key: `PBKDF2-HMAC-SHA256(ENC_STR(lowercase(identity)) || ENC_STR(record_id), salt)`
//! - AAD: the header (`MAGIC || iterations || salt || nonce`)
//! - Plaintext: JSON bytes of the record

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

#[cfg(test)]
use mockall::automock;

use crate::crypto::hash::{encode_string, u32_be};
use crate::domain::{Ciphertext, Identity, Record, RecordId};

/// Encryption key (32 bytes for AES-256)
pub type EncryptionKey = [u8; 32];

/// Ciphertext format marker
pub const CIPHERTEXT_MAGIC: &[u8; 4] = b"APC1";

/// Nonce size for AES-GCM (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// KDF salt size (16 bytes)
pub const SALT_SIZE: usize = 16;

/// Header length: magic + iterations + salt + nonce
pub const HEADER_SIZE: usize = CIPHERTEXT_MAGIC.len() + 4 + SALT_SIZE + NONCE_SIZE;

/// Default PBKDF2 iteration count
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

/// Upper bound accepted when reading a header
pub const MAX_KDF_ITERATIONS: u32 = 10_000_000;

/// Error type for encryption operations
#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("record could not be serialized: {0}")]
    InvalidRecord(String),

    #[error("invalid KDF iteration count: {0}")]
    InvalidKdfParams(u32),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}

/// Error type for decryption operations
#[derive(Debug, thiserror::Error)]
pub enum DecryptionError {
    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    #[error("unsupported ciphertext version")]
    UnsupportedVersion,

    #[error("invalid KDF iteration count: {0}")]
    InvalidKdfParams(u32),

    #[error("authentication failed: wrong identity, wrong record id, or modified ciphertext")]
    AuthenticationFailed,

    #[error("decrypted bytes are not a record: {0}")]
    InvalidRecord(String),
}

/// Seals and opens records for a `(identity, record_id)` pair.
#[cfg_attr(test, automock)]
pub trait RecordCipher: Send + Sync {
    /// Encrypt a record so that only `(identity, record_id)` can decrypt it.
    fn encrypt(
        &self,
        record: &Record,
        identity: &Identity,
        record_id: &RecordId,
    ) -> Result<Ciphertext, EncryptionError>;

    /// Decrypt a ciphertext produced by [`RecordCipher::encrypt`].
    fn decrypt(
        &self,
        ciphertext: &Ciphertext,
        identity: &Identity,
        record_id: &RecordId,
    ) -> Result<Record, DecryptionError>;
}

/// PBKDF2 + AES-256-GCM implementation of [`RecordCipher`]
#[derive(Debug, Clone)]
pub struct IdentityCipher {
    iterations: u32,
}

impl Default for IdentityCipher {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_KDF_ITERATIONS,
        }
    }
}

impl IdentityCipher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a non-default iteration count for new ciphertexts.
    ///
    /// Decryption always uses the count recorded in the header.
    pub fn with_iterations(iterations: u32) -> Result<Self, EncryptionError> {
        if iterations == 0 || iterations > MAX_KDF_ITERATIONS {
            return Err(EncryptionError::InvalidKdfParams(iterations));
        }
        Ok(Self { iterations })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

/// Derive the record key for `(identity, record_id)`.
///
/// `password = ENC_STR(lowercase(identity)) || ENC_STR(record_id)`
pub fn derive_record_key(
    identity: &Identity,
    record_id: &RecordId,
    salt: &[u8; SALT_SIZE],
    iterations: u32,
) -> EncryptionKey {
    let mut password = encode_string(&identity.normalized());
    password.extend_from_slice(&encode_string(record_id.as_str()));

    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(&password, salt, iterations, &mut key);
    key
}

fn build_header(iterations: u32, salt: &[u8; SALT_SIZE], nonce: &[u8; NONCE_SIZE]) -> Vec<u8> {
    let mut header = Vec::with_capacity(HEADER_SIZE);
    header.extend_from_slice(CIPHERTEXT_MAGIC);
    header.extend_from_slice(&u32_be(iterations));
    header.extend_from_slice(salt);
    header.extend_from_slice(nonce);
    header
}

impl RecordCipher for IdentityCipher {
    fn encrypt(
        &self,
        record: &Record,
        identity: &Identity,
        record_id: &RecordId,
    ) -> Result<Ciphertext, EncryptionError> {
        let plaintext =
            serde_json::to_vec(record).map_err(|e| EncryptionError::InvalidRecord(e.to_string()))?;

        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let key = derive_record_key(identity, record_id, &salt, self.iterations);
        let header = build_header(self.iterations, &salt, &nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| EncryptionError::EncryptionFailed(e.to_string()))?;
        let ciphertext_with_tag = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                aes_gcm::aead::Payload {
                    msg: &plaintext,
                    aad: &header,
                },
            )
            .map_err(|e| EncryptionError::EncryptionFailed(e.to_string()))?;

        let mut blob = header;
        blob.extend_from_slice(&ciphertext_with_tag);
        Ok(Ciphertext::new(base64_encode(&blob)))
    }

    fn decrypt(
        &self,
        ciphertext: &Ciphertext,
        identity: &Identity,
        record_id: &RecordId,
    ) -> Result<Record, DecryptionError> {
        let blob = base64_decode(ciphertext.as_str())?;
        if blob.len() < HEADER_SIZE + TAG_SIZE {
            return Err(DecryptionError::Malformed(format!(
                "expected at least {} bytes, got {}",
                HEADER_SIZE + TAG_SIZE,
                blob.len()
            )));
        }

        let (header, body) = blob.split_at(HEADER_SIZE);
        if &header[..4] != CIPHERTEXT_MAGIC {
            return Err(DecryptionError::UnsupportedVersion);
        }

        let mut iter_bytes = [0u8; 4];
        iter_bytes.copy_from_slice(&header[4..8]);
        let iterations = u32::from_be_bytes(iter_bytes);
        if iterations == 0 || iterations > MAX_KDF_ITERATIONS {
            return Err(DecryptionError::InvalidKdfParams(iterations));
        }

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&header[8..8 + SALT_SIZE]);
        let nonce = Nonce::from_slice(&header[8 + SALT_SIZE..]);

        let key = derive_record_key(identity, record_id, &salt, iterations);
        let cipher =
            Aes256Gcm::new_from_slice(&key).map_err(|e| DecryptionError::Malformed(e.to_string()))?;
        let plaintext = cipher
            .decrypt(nonce, aes_gcm::aead::Payload { msg: body, aad: header })
            .map_err(|_| DecryptionError::AuthenticationFailed)?;

        serde_json::from_slice(&plaintext).map_err(|e| DecryptionError::InvalidRecord(e.to_string()))
    }
}

/// Encode bytes as standard base64 with padding
pub fn base64_encode(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Decode standard base64, tolerating a missing pad
pub fn base64_decode(s: &str) -> Result<Vec<u8>, DecryptionError> {
    let s = s.trim();
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(s))
        .map_err(|e| DecryptionError::Malformed(format!("invalid base64: {e}")))
}
