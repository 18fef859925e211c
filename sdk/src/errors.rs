//! Error types and handling
//!
//! This module provides the error types shared by the Delve engine and its CLI.
//! All errors implement the `DelveErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Error messages never carry API keys. Provider URLs that embed keys are
//! scrubbed by the engine before they are wrapped in an `EngineError`.

use thiserror::Error;

/// Trait for Delve error extensions
///
/// Provides additional context for errors, including user-friendly hints and
/// recoverability information.
pub trait DelveErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around (a later row in a
    /// batch may still succeed). Non-recoverable errors need the user to fix
    /// configuration or credentials first.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **LLM Provider**: completion API failures that end a run
/// - **Secrets**: missing API keys, keychain failures
/// - **Input**: empty queries, CSV files that do not fit the template
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, DelveErrorExt};
///
/// let error = EngineError::MissingSecret("crunchbase_api_key".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(!error.is_recoverable());
///
/// let transient = EngineError::LLMTimeout;
/// assert!(transient.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("All LLM providers exhausted: {0}")]
    AllProvidersExhausted(String),

    #[error("LLM call timed out")]
    LLMTimeout,

    // Secret errors
    #[error("Missing secret: {0}")]
    MissingSecret(String),

    #[error("Keyring error: {0}")]
    KeyringError(String),

    // Input errors
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid batch input: {0}")]
    InvalidBatch(String),
}

impl DelveErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::LLMProvider(_) => "LLM provider unavailable. Check your API keys and network",
            Self::AllProvidersExhausted(_) => {
                "No LLM provider answered. Start Ollama or set DELVE_OPENAI_API_KEY"
            }
            Self::LLMTimeout => "LLM provider took too long to respond. Try again",
            Self::MissingSecret(_) => {
                "Set the DELVE_<NAME> environment variable or store the key in the system keychain"
            }
            Self::KeyringError(_) => "Failed to access secure storage. Check system keychain",
            Self::InvalidQuery(_) => "Pass a non-empty question",
            Self::InvalidBatch(_) => "Check the CSV file and the query template placeholders",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_)
            | Self::AllProvidersExhausted(_)
            | Self::InvalidQuery(_)
            | Self::MissingSecret(_)
            | Self::KeyringError(_)
            | Self::InvalidBatch(_) => false,

            _ => true,
        }
    }
}
