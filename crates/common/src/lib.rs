//! presclock common utilities
//!
//! Shared infrastructure for all presclock crates:
//! - Error types and result aliases
//! - Tick and time-unit conversions
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
