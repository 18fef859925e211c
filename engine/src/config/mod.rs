//! Configuration management
//!
//! This module handles loading, validation, and management of the Delve configuration.
//! Configuration is stored in TOML format at ~/.delve/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **llm**: Completion provider settings and preferences
//! - **providers**: Endpoints of the company-data, search and page-fetch services
//! - **retrieval**: Fetch budget, retry policy and HTTP timeouts
//! - **cache**: Entity cache write-back
//! - **batch**: CSV batch concurrency
//!
//! API keys are never stored here. They are read from `DELVE_*` environment
//! variables or the OS keychain (see [`crate::secrets`]).
//!
//! # Examples
//!
//! ```no_run
//! use delve_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Data dir: {:?}", config.core.data_dir);
//! println!("Default provider: {}", config.llm.default_provider);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    pub core: CoreConfig,

    /// LLM provider configuration
    pub llm: LLMConfig,

    /// External data provider endpoints
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Retrieval budget and retry policy
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Entity cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// CSV batch settings
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Default LLM provider (openai, ollama)
    pub default_provider: String,

    /// OpenAI-compatible provider settings
    #[serde(default)]
    pub openai: OpenAIConfig,

    /// Ollama provider settings
    #[serde(default)]
    pub ollama: OllamaConfig,
}

/// OpenAI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for the chat completions API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model used for triage, decomposition, routing and synthesis
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Cheaper model used for summaries and query generation
    #[serde(default = "default_openai_light_model")]
    pub light_model: String,
    // Note: API key stored in env/keychain, not in config
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

/// External data provider endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Crunchbase v4 API base URL
    #[serde(default = "default_crunchbase_base_url")]
    pub crunchbase_base_url: String,

    /// Google Custom Search JSON API endpoint
    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,

    /// Custom Search engine id (cx)
    #[serde(default)]
    pub search_engine_id: String,

    /// Number of results requested per search
    #[serde(default = "default_search_results")]
    pub search_results: usize,

    /// ScraperAPI endpoint
    #[serde(default = "default_scraper_base_url")]
    pub scraper_base_url: String,

    /// Host whose pages are never scraped by web research (profiles go
    /// through the profile store instead)
    #[serde(default = "default_profile_host")]
    pub profile_host: String,
}

/// Retrieval budget and retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Successfully fetched pages per search query (hard cap)
    #[serde(default = "default_max_fetched_pages")]
    pub max_fetched_pages: usize,

    /// Candidate URLs considered per search query
    #[serde(default = "default_max_candidate_urls")]
    pub max_candidate_urls: usize,

    /// Attempts per URL
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,

    /// Fixed delay between attempts after a transient failure
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// HTTP timeout for data provider calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Entity cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Persist freshly fetched company profiles into the cache
    #[serde(default = "default_true")]
    pub write_back: bool,
}

/// CSV batch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Rows researched concurrently (each row owns its own run context)
    #[serde(default = "default_batch_concurrency")]
    pub concurrency: usize,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.delve")
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_openai_light_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_crunchbase_base_url() -> String {
    "https://api.crunchbase.com/api/v4".to_string()
}

fn default_search_base_url() -> String {
    "https://www.googleapis.com/customsearch/v1".to_string()
}

fn default_search_results() -> usize {
    10
}

fn default_scraper_base_url() -> String {
    "http://api.scraperapi.com".to_string()
}

fn default_profile_host() -> String {
    "linkedin.com".to_string()
}

fn default_max_fetched_pages() -> usize {
    2
}

fn default_max_candidate_urls() -> usize {
    10
}

fn default_fetch_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_batch_concurrency() -> usize {
    1
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            default_provider: "openai".to_string(),
            openai: OpenAIConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            light_model: default_openai_light_model(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            crunchbase_base_url: default_crunchbase_base_url(),
            search_base_url: default_search_base_url(),
            search_engine_id: String::new(),
            search_results: default_search_results(),
            scraper_base_url: default_scraper_base_url(),
            profile_host: default_profile_host(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_fetched_pages: default_max_fetched_pages(),
            max_candidate_urls: default_max_candidate_urls(),
            fetch_attempts: default_fetch_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { write_back: true }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_batch_concurrency(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.delve/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if validation fails.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default_config();

        // Serialize before processing so the file keeps the portable ~ path
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.delve/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".delve").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
                data_dir: default_data_dir(),
            },
            llm: LLMConfig::default(),
            providers: ProvidersConfig::default(),
            retrieval: RetrievalConfig::default(),
            cache: CacheConfig::default(),
            batch: BatchConfig::default(),
        }
    }

    /// Path of the SQLite database inside the data directory
    pub fn db_path(&self) -> PathBuf {
        self.core.data_dir.join("delve.db")
    }

    /// Validate and process configuration
    ///
    /// Validates enumerated values and numeric bounds, expands ~ in the data
    /// directory and creates it if missing.
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_providers = ["openai", "ollama"];
        if !valid_providers.contains(&self.llm.default_provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid default provider '{}'. Must be one of: {}",
                self.llm.default_provider,
                valid_providers.join(", ")
            )));
        }

        if self.retrieval.max_fetched_pages == 0 {
            return Err(EngineError::Config(
                "retrieval.max_fetched_pages must be at least 1".to_string(),
            ));
        }
        if self.retrieval.fetch_attempts == 0 {
            return Err(EngineError::Config(
                "retrieval.fetch_attempts must be at least 1".to_string(),
            ));
        }
        if self.retrieval.max_candidate_urls == 0 {
            return Err(EngineError::Config(
                "retrieval.max_candidate_urls must be at least 1".to_string(),
            ));
        }
        // An empty host would match, and skip, every result URL
        if self.providers.profile_host.trim().is_empty() {
            return Err(EngineError::Config(
                "providers.profile_host must not be empty".to_string(),
            ));
        }
        if self.providers.search_results == 0 || self.providers.search_results > 10 {
            return Err(EngineError::Config(
                "providers.search_results must be between 1 and 10".to_string(),
            ));
        }
        if self.batch.concurrency == 0 {
            return Err(EngineError::Config(
                "batch.concurrency must be at least 1".to_string(),
            ));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
