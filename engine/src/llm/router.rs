//! LLM Router
//!
//! Ranks the configured completion providers for each request and fails over
//! between them. The user's default provider always ranks first; among the
//! rest, large prompts favor cloud providers and cost breaks ties.

use super::{CompletionRequest, LLMError, LLMProvider, LLMResponse};
use crate::config::LLMConfig;
use std::sync::Arc;
use std::time::Duration;

/// Prompts above this many estimated tokens prefer cloud providers.
const LARGE_PROMPT_TOKENS: usize = 4000;

/// LLM Router that selects providers per request
pub struct LLMRouter {
    providers: Vec<Box<dyn LLMProvider>>,
    config: Arc<LLMConfig>,
}

impl LLMRouter {
    pub fn new(providers: Vec<Box<dyn LLMProvider>>, config: Arc<LLMConfig>) -> Self {
        Self { providers, config }
    }

    /// Rough token estimate: ~4 characters per token across both prompts.
    pub fn estimate_tokens(request: &CompletionRequest) -> usize {
        (request.system.len() + request.user.len()) / 4
    }

    /// Rank providers for a prompt of `estimated_tokens` (best first).
    ///
    /// 1. The configured default provider
    /// 2. Cloud providers for large prompts
    /// 3. Lower estimated cost
    pub fn rank_providers(&self, estimated_tokens: usize) -> Vec<&dyn LLMProvider> {
        let mut providers: Vec<&dyn LLMProvider> =
            self.providers.iter().map(|b| b.as_ref()).collect();

        let score = |p: &dyn LLMProvider| -> f64 {
            let mut score = 0.0_f64;
            if p.name() == self.config.default_provider {
                score += 200.0;
            }
            if estimated_tokens > LARGE_PROMPT_TOKENS && !p.is_local() {
                score += 50.0;
            }
            score - p.estimated_cost(estimated_tokens) * 1000.0
        };

        providers.sort_by(|a, b| {
            score(*b)
                .partial_cmp(&score(*a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        providers
    }

    /// Call providers with automatic failover.
    ///
    /// Local providers get 120s (model loading plus generation), cloud
    /// providers 60s. Returns the response and the name of the provider that
    /// produced it.
    pub async fn call(&self, request: &CompletionRequest) -> super::Result<(LLMResponse, String)> {
        if self.providers.is_empty() {
            return Err(LLMError::ProviderUnavailable(
                "No LLM providers configured".to_string(),
            ));
        }

        let ranked_providers = self.rank_providers(Self::estimate_tokens(request));

        for provider in ranked_providers {
            let timeout_secs = if provider.is_local() { 120 } else { 60 };
            tracing::debug!(
                label = request.label,
                "Attempting provider: {} (timeout: {}s)",
                provider.name(),
                timeout_secs
            );

            let result =
                tokio::time::timeout(Duration::from_secs(timeout_secs), provider.generate(request))
                    .await;

            match result {
                Ok(Ok(response)) => {
                    tracing::debug!(label = request.label, "Provider {} succeeded", provider.name());
                    return Ok((response, provider.name().to_string()));
                }
                Ok(Err(e)) => {
                    tracing::warn!(label = request.label, "Provider {} failed: {}", provider.name(), e);
                }
                Err(_) => {
                    tracing::warn!(
                        label = request.label,
                        "Provider {} timed out after {}s",
                        provider.name(),
                        timeout_secs
                    );
                }
            }
        }

        tracing::error!(label = request.label, "All LLM providers exhausted");
        Err(LLMError::ProviderUnavailable(
            "All LLM providers failed".to_string(),
        ))
    }

    /// Call for a plain-text answer. A function call in reply to a text-only
    /// request is a parse error.
    pub async fn complete_text(&self, request: &CompletionRequest) -> super::Result<String> {
        self.complete_text_with_provider(request)
            .await
            .map(|(text, _)| text)
    }

    /// Like [`complete_text`](Self::complete_text), also returning the name
    /// of the provider that answered.
    pub async fn complete_text_with_provider(
        &self,
        request: &CompletionRequest,
    ) -> super::Result<(String, String)> {
        match self.call(request).await? {
            (LLMResponse::FinalAnswer(answer), provider) => Ok((answer.content, provider)),
            (LLMResponse::ToolCall(call), provider) => Err(LLMError::ParseError(format!(
                "{} returned a function call ({}) for a text request",
                provider, call.name
            ))),
        }
    }

    /// Check the health of all registered providers
    /// Returns a list of (provider_name, is_healthy)
    pub async fn check_health(&self) -> Vec<(&str, bool)> {
        let mut results = Vec::new();
        for provider in &self.providers {
            let is_healthy = provider.check_health().await;
            results.push((provider.name(), is_healthy));
        }
        results
    }
}
