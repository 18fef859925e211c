//! Web research: generate search queries, search, fetch, summarize
//!
//! For each generated query the top non-profile result URLs are fetched in
//! rank order until `max_fetched_pages` bodies succeed. Each URL gets up to
//! `fetch_attempts` tries; transient failures wait `retry_backoff` before the
//! next try, permanent failures move on to the next URL.

use super::summarize::Summarizer;
use super::CapabilityOutcome;
use crate::conductor::context::RunContext;
use crate::config::{ProvidersConfig, RetrievalConfig};
use crate::llm::router::LLMRouter;
use crate::llm::CompletionRequest;
use crate::providers::html::extract_body_text;
use crate::providers::{FetchError, PageFetcher, WebSearch};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const NO_CONTENT: &str = "No content was extracted.";
pub const NO_URLS: &str = "No non-profile URLs found.";
pub const NO_RESULTS_ANY: &str = "No results found for any query.";

/// Limits applied to one web research invocation
#[derive(Debug, Clone)]
pub struct RetrievalPolicy {
    pub search_results: usize,
    pub max_candidate_urls: usize,
    pub max_fetched_pages: usize,
    pub fetch_attempts: u32,
    pub retry_backoff: Duration,
    /// Result URLs containing this host are skipped
    pub profile_host: String,
}

impl RetrievalPolicy {
    pub fn from_config(providers: &ProvidersConfig, retrieval: &RetrievalConfig) -> Self {
        Self {
            search_results: providers.search_results,
            max_candidate_urls: retrieval.max_candidate_urls,
            max_fetched_pages: retrieval.max_fetched_pages,
            fetch_attempts: retrieval.fetch_attempts,
            retry_backoff: Duration::from_millis(retrieval.retry_backoff_ms),
            profile_host: providers.profile_host.clone(),
        }
    }
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self::from_config(&ProvidersConfig::default(), &RetrievalConfig::default())
    }
}

/// Parse the query-generation response: a JSON array of strings, a single
/// JSON string, or one query per line. Quotes, code fences, brackets and
/// trailing commas are stripped; empty entries are dropped.
pub fn parse_queries(response: &str) -> Vec<String> {
    let raw: Vec<String> = match serde_json::from_str::<Value>(response.trim()) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Ok(Value::String(s)) => vec![s],
        _ => response.lines().map(str::to_string).collect(),
    };

    raw.iter()
        .map(|q| {
            q.replace("```json", "")
                .replace("```", "")
                .replace(['[', ']'], "")
                .trim()
                .trim_end_matches(',')
                .trim()
                .trim_matches('"')
                .trim()
                .to_string()
        })
        .filter(|q| !q.is_empty())
        .collect()
}

pub struct WebResearch {
    router: Arc<LLMRouter>,
    search: Arc<dyn WebSearch>,
    fetcher: Arc<dyn PageFetcher>,
    summarizer: Arc<Summarizer>,
    policy: RetrievalPolicy,
}

impl WebResearch {
    pub fn new(
        router: Arc<LLMRouter>,
        search: Arc<dyn WebSearch>,
        fetcher: Arc<dyn PageFetcher>,
        summarizer: Arc<Summarizer>,
        policy: RetrievalPolicy,
    ) -> Self {
        Self {
            router,
            search,
            fetcher,
            summarizer,
            policy,
        }
    }

    pub async fn run(&self, sub_task: &str, context: &RunContext) -> CapabilityOutcome {
        let queries = self.generate_queries(sub_task, context).await;
        info!(count = queries.len(), "Generated search queries");

        let mut sections = Vec::with_capacity(queries.len());
        let mut any_content = false;
        for query in &queries {
            let (section, had_content) = self.research_query(query).await;
            any_content |= had_content;
            sections.push(section);
        }

        let combined = if sections.is_empty() {
            NO_RESULTS_ANY.to_string()
        } else {
            sections.join("\n\n")
        };

        match self.summarizer.summarize(sub_task, &combined).await {
            Ok(summary) if any_content => CapabilityOutcome::Found(summary),
            Ok(summary) => CapabilityOutcome::Missing(summary),
            Err(e) => {
                warn!("Web research summarization failed: {}", e);
                CapabilityOutcome::Degraded(combined)
            }
        }
    }

    /// Short literal search queries for the sub-task. Falls back to the
    /// sub-task itself when the completion call fails.
    pub async fn generate_queries(&self, sub_task: &str, context: &RunContext) -> Vec<String> {
        let system = "You write web search queries for research. Given a sub-task, produce the \
            shortest literal query that will surface relevant results. Prefer a single query. \
            Produce several only when the context lists multiple entities (companies, people), \
            one per entity. Never include words such as current, today or latest; the date is \
            handled separately. Return the queries as a JSON array of strings.";
        let request = CompletionRequest::new(
            "search_queries",
            system,
            format!("sub-task: '{}'\ncontext: '{}'", sub_task, context.as_str()),
        )
        .light()
        .max_tokens(150)
        .temperature(0.1);

        match self.router.complete_text(&request).await {
            Ok(response) => parse_queries(&response),
            Err(e) => {
                warn!("Query generation failed, searching the sub-task directly: {}", e);
                vec![sub_task.to_string()]
            }
        }
    }

    /// One query end to end. Returns the section text and whether any page
    /// content was found.
    async fn research_query(&self, query: &str) -> (String, bool) {
        let hits = match self.search.search(query, self.policy.search_results).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Search failed for '{}': {}", query, e);
                Vec::new()
            }
        };
        if hits.is_empty() {
            return (format!("No results found for query: {}", query), false);
        }

        let urls: Vec<String> = hits
            .into_iter()
            .map(|h| h.url)
            .filter(|url| !url.contains(&self.policy.profile_host))
            .take(self.policy.max_candidate_urls)
            .collect();
        if urls.is_empty() {
            return (NO_URLS.to_string(), false);
        }

        let pages = self.fetch_pages(&urls).await;
        let combined = pages
            .iter()
            .filter(|(_, text)| !text.is_empty())
            .map(|(url, text)| format!("Source: {}\n{}", url, text))
            .collect::<Vec<_>>()
            .join("\n\n");
        if combined.is_empty() {
            return (NO_CONTENT.to_string(), false);
        }

        match self.summarizer.summarize(query, &combined).await {
            Ok(summary) => (summary, true),
            Err(e) => {
                warn!("Page summarization failed for '{}': {}", query, e);
                (combined, true)
            }
        }
    }

    /// Fetch candidate URLs in order until `max_fetched_pages` succeed.
    pub async fn fetch_pages(&self, urls: &[String]) -> Vec<(String, String)> {
        let mut pages = Vec::new();
        for url in urls {
            if pages.len() >= self.policy.max_fetched_pages {
                break;
            }
            if let Some(text) = self.fetch_with_retry(url).await {
                pages.push((url.clone(), text));
            }
        }
        pages
    }

    /// Body text of one URL, or `None` once attempts are exhausted or a
    /// permanent failure occurs.
    pub async fn fetch_with_retry(&self, url: &str) -> Option<String> {
        for attempt in 1..=self.policy.fetch_attempts {
            match self.fetcher.fetch(url).await {
                Ok(html) => {
                    debug!(url, attempt, "Fetched page");
                    return Some(extract_body_text(&html));
                }
                Err(FetchError::Permanent(reason)) => {
                    debug!(url, "Permanent fetch failure: {}", reason);
                    return None;
                }
                Err(FetchError::Transient(reason)) => {
                    debug!(url, attempt, "Transient fetch failure: {}", reason);
                    if attempt < self.policy.fetch_attempts {
                        tokio::time::sleep(self.policy.retry_backoff).await;
                    }
                }
            }
        }

        warn!(url, "All fetch attempts failed");
        None
    }
}
