//! Domain models for audit provenance
//!
//! Value types shared by the hasher, cipher, store, ledger and orchestrator.

mod flow;
mod ledger;
mod types;

pub use flow::*;
pub use ledger::*;
pub use types::*;
