use super::{
    CompletionRequest, FinalAnswer, LLMError, LLMProvider, LLMResponse, ModelTier, ToolCall,
};
use crate::config::OpenAIConfig;
use crate::secrets::{SecretCache, OPENAI_API_KEY};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// OpenAI-compatible chat completions provider with native function calling.
pub struct OpenAIProvider {
    config: OpenAIConfig,
    secret_cache: Arc<SecretCache>,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig, secret_cache: Arc<SecretCache>) -> Self {
        Self {
            config,
            secret_cache,
            client: reqwest::Client::new(),
        }
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Primary => &self.config.model,
            ModelTier::Light => &self.config.light_model,
        }
    }

    fn build_payload(&self, request: &CompletionRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages()
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.to_string(),
                    "content": msg.content
                })
            })
            .collect();

        let mut payload = json!({
            "model": self.model_for(request.tier),
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        if !request.functions.is_empty() {
            payload["tools"] = json!(request.tools_payload());
            payload["tool_choice"] = json!("auto");
        }

        payload
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_local(&self) -> bool {
        false
    }

    fn estimated_cost(&self, tokens: usize) -> f64 {
        // Approx $0.005 per 1k tokens for gpt-4o input
        (tokens as f64 / 1000.0) * 0.005
    }

    async fn check_health(&self) -> bool {
        self.secret_cache.get_secret(OPENAI_API_KEY).is_ok()
    }

    async fn generate(&self, request: &CompletionRequest) -> super::Result<LLMResponse> {
        let api_key = self
            .secret_cache
            .get_secret(OPENAI_API_KEY)
            .map_err(|e| LLMError::AuthenticationFailed(e.to_string()))?;

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let payload = self.build_payload(request);

        tracing::debug!(
            label = request.label,
            model = self.model_for(request.tier),
            functions = request.functions.len(),
            "OpenAI request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key.unsecure()))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    LLMError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 | 403 => LLMError::AuthenticationFailed(text),
                429 => LLMError::RateLimitExceeded,
                500..=599 => LLMError::ProviderUnavailable(format!("HTTP {}: {}", status, text)),
                _ => LLMError::InvalidRequest(text),
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        parse_chat_response(&data, !request.functions.is_empty())
    }
}

/// Interpret a chat-completions response body.
fn parse_chat_response(data: &serde_json::Value, functions_offered: bool) -> super::Result<LLMResponse> {
    let message = data
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .ok_or_else(|| LLMError::ParseError("No message in response".to_string()))?;

    if functions_offered {
        if let Some(call) = message
            .get("tool_calls")
            .and_then(|t| t.as_array())
            .and_then(|t| t.first())
        {
            let function = call
                .get("function")
                .ok_or_else(|| LLMError::ParseError("Tool call without function".to_string()))?;
            let name = function
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or_else(|| LLMError::ParseError("Tool call without name".to_string()))?;
            let arguments = function.get("arguments").cloned().unwrap_or(json!("{}"));

            return Ok(LLMResponse::ToolCall(ToolCall::from_native(
                call.get("id").and_then(|i| i.as_str()),
                name,
                &arguments,
            )));
        }
    }

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| LLMError::ParseError("Empty content".to_string()))?;

    if functions_offered {
        if let Some(tool_call) = super::parse_tool_calls(content) {
            return Ok(LLMResponse::ToolCall(tool_call));
        }
    }

    Ok(LLMResponse::FinalAnswer(FinalAnswer::new(content.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_native_tool_call() {
        let data = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "company_lookup",
                            "arguments": "{\"company_names\":[\"Acme Corp\"]}"
                        }
                    }]
                }
            }]
        });

        match parse_chat_response(&data, true).unwrap() {
            LLMResponse::ToolCall(tc) => {
                assert_eq!(tc.id, "call_abc");
                assert_eq!(tc.name, "company_lookup");
                assert!(tc.arguments.contains("Acme Corp"));
            }
            other => panic!("expected tool call, got {:?}", other),
        }
    }

    #[test]
    fn test_text_only_request_ignores_json_content() {
        let data = json!({
            "choices": [{
                "message": {
                    "content": "{\"function\": \"web_research\", \"arguments\": {}}"
                }
            }]
        });

        assert!(matches!(
            parse_chat_response(&data, false).unwrap(),
            LLMResponse::FinalAnswer(_)
        ));
    }

    #[test]
    fn test_missing_choices_is_parse_error() {
        let data = json!({"error": "boom"});
        assert!(matches!(
            parse_chat_response(&data, false),
            Err(LLMError::ParseError(_))
        ));
    }
}
