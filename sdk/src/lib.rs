//! Delve SDK
//!
//! Shared library providing the error types used by the Delve engine and CLI.

/// Error types and handling
pub mod errors;

// Re-export commonly used types
pub use errors::{DelveErrorExt, EngineError};
