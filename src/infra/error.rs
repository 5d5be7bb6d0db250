//! Error types for the provenance pipeline

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::crypto::{CanonicalizationError, DecryptionError, EncryptionError};
use crate::domain::{Identity, RecordId, TamperWarning};
use crate::ledger::LedgerError;
use crate::notifications::NotificationError;
use crate::store::{StoreError, UnwrapError};

/// Stable error taxonomy shared by flows, logs and the HTTP surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Canonicalization,
    Encryption,
    Decryption,
    StoreUnavailable,
    Unwrap,
    LedgerWrite,
    LedgerRead,
    NotConfigured,
    NotAuthorized,
    RecordNotFound,
    NotStored,
    Tamper,
    IdentityChanged,
    InvalidTransition,
    InvalidRequest,
    Notification,
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Canonicalization => "canonicalization",
            ErrorKind::Encryption => "encryption",
            ErrorKind::Decryption => "decryption",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::Unwrap => "unwrap",
            ErrorKind::LedgerWrite => "ledger_write",
            ErrorKind::LedgerRead => "ledger_read",
            ErrorKind::NotConfigured => "not_configured",
            ErrorKind::NotAuthorized => "not_authorized",
            ErrorKind::RecordNotFound => "record_not_found",
            ErrorKind::NotStored => "not_stored",
            ErrorKind::Tamper => "tamper",
            ErrorKind::IdentityChanged => "identity_changed",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Notification => "notification",
            ErrorKind::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in the provenance pipeline
#[derive(Error, Debug)]
pub enum ProvenanceError {
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Decryption(#[from] DecryptionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("fetched content could not be unwrapped: {0}")]
    Unwrap(#[from] UnwrapError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    /// Caller is not the creator recorded on the ledger
    #[error("{caller} is not the creator of record {record_id}")]
    NotAuthorized { record_id: RecordId, caller: Identity },

    /// No identity is connected
    #[error("no identity connected")]
    MissingIdentity,

    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// Entry was anchored without a storage link
    #[error("record {0} was anchored without stored content")]
    NotStored(RecordId),

    /// Content failed the digest check and could not be decrypted
    #[error("tampering detected: {warning}")]
    TamperDetected {
        warning: TamperWarning,
        #[source]
        source: DecryptionError,
    },

    /// The identity bound to a flow is no longer the connected identity
    #[error("identity changed during flow: bound {bound}, now {}", .current.as_ref().map(Identity::as_str).unwrap_or("<none>"))]
    IdentityChanged {
        bound: Identity,
        current: Option<Identity>,
    },

    #[error("invalid state transition from {from}: {reason}")]
    InvalidTransition { from: String, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ProvenanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProvenanceError::Canonicalization(_) => ErrorKind::Canonicalization,
            ProvenanceError::Encryption(_) => ErrorKind::Encryption,
            ProvenanceError::Decryption(_) => ErrorKind::Decryption,
            ProvenanceError::Store(StoreError::NotConfigured) => ErrorKind::NotConfigured,
            ProvenanceError::Store(_) => ErrorKind::StoreUnavailable,
            ProvenanceError::Unwrap(_) => ErrorKind::Unwrap,
            ProvenanceError::Ledger(LedgerError::NotConfigured) => ErrorKind::NotConfigured,
            ProvenanceError::Ledger(LedgerError::Write(_)) => ErrorKind::LedgerWrite,
            ProvenanceError::Ledger(LedgerError::Read(_)) => ErrorKind::LedgerRead,
            ProvenanceError::Ledger(LedgerError::Configuration(_)) => ErrorKind::Configuration,
            ProvenanceError::Notification(_) => ErrorKind::Notification,
            ProvenanceError::NotAuthorized { .. } | ProvenanceError::MissingIdentity => {
                ErrorKind::NotAuthorized
            }
            ProvenanceError::RecordNotFound(_) => ErrorKind::RecordNotFound,
            ProvenanceError::NotStored(_) => ErrorKind::NotStored,
            ProvenanceError::TamperDetected { .. } => ErrorKind::Tamper,
            ProvenanceError::IdentityChanged { .. } => ErrorKind::IdentityChanged,
            ProvenanceError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            ProvenanceError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ProvenanceError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Tamper report carried by this error, if any
    pub fn tamper_warning(&self) -> Option<&TamperWarning> {
        match self {
            ProvenanceError::TamperDetected { warning, .. } => Some(warning),
            _ => None,
        }
    }
}

/// Result type for provenance operations
pub type Result<T> = std::result::Result<T, ProvenanceError>;
