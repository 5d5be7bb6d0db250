//! HTTP API for the provenance core
//!
//! REST endpoints for storing, listing and verifying records.

pub mod error;
pub mod handlers;
mod rest;
pub mod types;

pub use error::{ApiError, ErrorCode};
pub use rest::router;
