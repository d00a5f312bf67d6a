//! Vivitag Common Utilities
//!
//! Shared infrastructure for all Vivitag crates:
//! - Error types and result aliases
//! - Playback and pacing clocks for the render/capture loop
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
