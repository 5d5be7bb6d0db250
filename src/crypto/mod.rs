//! Cryptographic utilities for audit provenance
//!
//! Provides:
//! - Canonical JSON hashing (deterministic, cross-language compatible)
//! - Identity-bound record encryption (PBKDF2 + AES-256-GCM)

mod cipher;
mod hash;

pub use cipher::*;
pub use hash::*;
