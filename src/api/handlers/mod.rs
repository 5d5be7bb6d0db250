//! REST API handlers organized by domain.

pub mod health;
pub mod records;

pub use health::*;
pub use records::*;
