//! CLI interface for Delve
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Delve research agent
///
/// Answers free-text questions by decomposing them into sub-tasks, looking
/// each one up in company data, on the web or in stored profiles, and
/// synthesizing a final answer.
#[derive(Parser, Debug)]
#[command(name = "delve")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Research a single query and print the answer
    Ask {
        /// The question to research
        query: String,
    },

    /// Answer a query template for every row of a CSV file
    Batch {
        /// CSV file with a header row; rewritten with the answer column added
        csv: PathBuf,

        /// Query template with {Column} placeholders
        #[arg(short, long)]
        template: String,

        /// Name of the answer column (generated when omitted)
        #[arg(long)]
        column: Option<String>,
    },

    /// Show recent runs
    History {
        /// Number of runs to show (default: 10)
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show every step of a run
    Replay {
        /// Run ID to replay
        run_id: String,
    },

    /// Manage stored profiles
    Profiles {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Inspect the entity cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage API keys in the system keychain
    Secrets {
        #[command(subcommand)]
        action: SecretAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check providers and API keys
    Doctor,
}

/// Profile store actions
#[derive(Subcommand, Debug)]
pub enum ProfileAction {
    /// Import profiles from a JSON array (or a single JSON object)
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// Show a stored profile
    Show {
        /// Profile URL, exactly as stored
        url: String,
    },
}

/// Entity cache actions
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Print a cached record
    Show {
        /// Entity UUID
        uuid: String,
    },
}

/// Keychain actions
#[derive(Subcommand, Debug)]
pub enum SecretAction {
    /// Store a key, read from stdin
    Set {
        /// Key name (openai_api_key, crunchbase_api_key, google_api_key, scraper_api_key)
        name: String,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
}
