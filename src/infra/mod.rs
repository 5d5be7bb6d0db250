//! Infrastructure layer for audit provenance
//!
//! Contains:
//! - Error taxonomy (per-layer errors folded into `ProvenanceError`)
//! - Capability traits (clock)
//! - Graceful shutdown (signal handling, shared shutdown signal)

mod error;
mod graceful_shutdown;
mod traits;

pub use error::*;
pub use graceful_shutdown::{shutdown_signal, ShutdownCoordinator, ShutdownSignal};
pub use traits::*;
