//! Google Custom Search JSON API adapter

use super::{ProviderError, SearchHit, WebSearch};
use crate::secrets::{SecretCache, GOOGLE_API_KEY};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const PROVIDER: &str = "google";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    // Absent when the query has no results
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: String,
    #[serde(default)]
    snippet: String,
}

pub struct GoogleSearch {
    base_url: String,
    engine_id: String,
    secret_cache: Arc<SecretCache>,
    client: reqwest::Client,
}

impl GoogleSearch {
    pub fn new(
        base_url: impl Into<String>,
        engine_id: impl Into<String>,
        secret_cache: Arc<SecretCache>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            engine_id: engine_id.into(),
            secret_cache,
            client: super::http_client(timeout),
        }
    }
}

#[async_trait]
impl WebSearch for GoogleSearch {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, ProviderError> {
        let key = self
            .secret_cache
            .get_secret(GOOGLE_API_KEY)
            .map_err(|_| ProviderError::MissingKey(GOOGLE_API_KEY.to_string()))?;

        // The API caps `num` at 10
        let num = count.clamp(1, 10).to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("key", key.unsecure()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Request {
                provider: PROVIDER,
                message: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| ProviderError::Parse {
            provider: PROVIDER,
            message: e.without_url().to_string(),
        })?;

        Ok(parsed
            .items
            .into_iter()
            .map(|item| SearchHit {
                url: item.link,
                snippet: item.snippet,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_items_is_empty() {
        let parsed: SearchResponse =
            serde_json::from_str(r#"{"kind": "customsearch#search"}"#).unwrap();
        assert!(parsed.items.is_empty());
    }
}
