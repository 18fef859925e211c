//! Delve Engine Library
//!
//! This library provides the core functionality of the Delve research agent.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// Database persistence module
pub mod db;

/// LLM provider abstraction layer
pub mod llm;

/// External data provider adapters
pub mod providers;

/// Retrieval capabilities
pub mod capabilities;

/// Conductor orchestration module
pub mod conductor;

/// CSV batch mode
pub mod batch;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
