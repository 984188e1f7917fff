//! Cuegrid Common Utilities
//!
//! Shared infrastructure for all Cuegrid crates:
//! - Error types and result aliases
//! - Playback clock helpers: position formatting, drift measurement, tick cadence
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
