//! External data providers
//!
//! Thin HTTP adapters behind three traits, one per collaborator the research
//! capabilities talk to:
//!
//! - [`EntityDirectory`]: fuzzy company-name resolution and per-entity detail
//!   documents (Crunchbase v4)
//! - [`WebSearch`]: ranked result URLs for a query (Google Custom Search)
//! - [`PageFetcher`]: rendered HTML for a URL (ScraperAPI)
//!
//! Capabilities only see the traits, so tests substitute in-memory fakes or
//! point the real adapters at a `wiremock` server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod crunchbase;
pub mod google;
pub mod html;
pub mod scraper_api;

pub use crunchbase::CrunchbaseClient;
pub use google::GoogleSearch;
pub use scraper_api::ScraperApiFetcher;

/// Errors from the entity directory and search adapters
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    Request {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} returned HTTP {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("{provider} response could not be parsed: {message}")]
    Parse {
        provider: &'static str,
        message: String,
    },

    #[error("Missing API key: {0}")]
    MissingKey(String),

    #[error("Entity type '{0}' has no detail endpoint")]
    Unsupported(String),
}

/// Page fetch failure, split by whether another attempt may succeed
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FetchError {
    /// Rate limiting, server errors, timeouts, connection failures
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// Any other non-success response; retrying will not help
    #[error("permanent fetch failure: {0}")]
    Permanent(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Kind of entity a name resolved to. Determines the detail endpoint and
/// the cards requested from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Organization,
    Investment,
    FundingRound,
    Fund,
    Ipo,
    Other(String),
}

impl EntityType {
    pub fn from_def_id(def_id: &str) -> Self {
        match def_id {
            "organization" => EntityType::Organization,
            "investment" => EntityType::Investment,
            "funding_round" => EntityType::FundingRound,
            "fund" => EntityType::Fund,
            "ipo" => EntityType::Ipo,
            other => EntityType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EntityType::Organization => "organization",
            EntityType::Investment => "investment",
            EntityType::FundingRound => "funding_round",
            EntityType::Fund => "fund",
            EntityType::Ipo => "ipo",
            EntityType::Other(s) => s,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A company name resolved to its provider-assigned identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub uuid: String,
    pub name: String,
    pub entity_type: EntityType,
}

/// One web search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait EntityDirectory: Send + Sync {
    /// Best fuzzy match for a company name, or `None` when nothing matches.
    async fn resolve(&self, name: &str) -> Result<Option<ResolvedEntity>, ProviderError>;

    /// Raw detail document for a resolved entity.
    async fn fetch_detail(&self, entity: &ResolvedEntity) -> Result<serde_json::Value, ProviderError>;
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, ProviderError>;
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Rendered HTML for `url`.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Shared HTTP client with the configured request timeout.
pub(crate) fn http_client(timeout: std::time::Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}
