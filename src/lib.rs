//! Audit Provenance Library
//!
//! Tamper-evident provenance for audit records: canonical hashing,
//! identity-bound encryption, content-addressed storage and ledger anchoring.
//!
//! ## Modules
//!
//! - [`domain`] - Core value types (records, identities, digests, ledger entries)
//! - [`crypto`] - Canonical JSON hashing and identity-bound encryption
//! - [`store`] - Content-addressed blob storage and envelope unwrapping
//! - [`ledger`] - Ledger anchoring (contract, SQLite, in-memory)
//! - [`orchestrator`] - Store and verify flows
//! - [`identity`] - Connected identity capability
//! - [`notifications`] - Reconnecting push notification channel
//! - [`infra`] - Error taxonomy, clock, graceful shutdown
//! - [`metrics`] - Counters and latency histograms
//! - [`telemetry`] - Logging and OpenTelemetry integration
//! - [`api`] - REST API routes

pub mod api;
pub mod crypto;
pub mod domain;
pub mod identity;
pub mod infra;
pub mod ledger;
pub mod metrics;
pub mod migrations;
pub mod notifications;
pub mod orchestrator;
pub mod server;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use domain::{
    Ciphertext, Digest, Identity, LedgerEntry, Record, RecordId, StorageLink, StorageOutcome,
    StoreReceipt, StoreRequest, TamperWarning, VerifiedRecord,
};

pub use infra::{ErrorKind, ProvenanceError, Result};
pub use orchestrator::{FlowState, ProvenanceOrchestrator, StoreFlow};
