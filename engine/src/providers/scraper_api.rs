//! ScraperAPI page fetcher
//!
//! Fetches the rendered HTML of a page through ScraperAPI (`render=true`).
//! Rate limiting (429), server errors (5xx), timeouts and connection failures
//! are transient; every other non-success status is permanent.

use super::{FetchError, PageFetcher};
use crate::secrets::{SecretCache, SCRAPER_API_KEY};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

pub struct ScraperApiFetcher {
    base_url: String,
    secret_cache: Arc<SecretCache>,
    client: reqwest::Client,
}

impl ScraperApiFetcher {
    pub fn new(base_url: impl Into<String>, secret_cache: Arc<SecretCache>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            secret_cache,
            client: super::http_client(timeout),
        }
    }
}

/// Classify a non-success status.
pub fn classify_status(status: StatusCode) -> FetchError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        FetchError::Transient(format!("HTTP {}", status.as_u16()))
    } else {
        FetchError::Permanent(format!("HTTP {}", status.as_u16()))
    }
}

#[async_trait]
impl PageFetcher for ScraperApiFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let key = self
            .secret_cache
            .get_secret(SCRAPER_API_KEY)
            .map_err(|e| FetchError::Permanent(e.to_string()))?;

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("api_key", key.unsecure()), ("url", url), ("render", "true")])
            .send()
            .await
            // Never surface the request URL: it carries the API key
            .map_err(|e| FetchError::Transient(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Transient(e.without_url().to_string()))
    }
}
