//! LLM Provider Abstraction Layer
//!
//! Common interface for the text-completion services the research pipeline
//! talks to (OpenAI-compatible chat completions and Ollama). Every call site
//! builds a [`CompletionRequest`] carrying its own prompt, token budget,
//! temperature and, for capability routing, the function schemas on offer.
//! The [`router::LLMRouter`] ranks providers and fails over between them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod ollama;
pub mod openai;
pub mod router;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Today's date as injected into date-aware prompts.
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// Message in a chat-style request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// Which model a provider should use for a request.
///
/// `Primary` serves triage, decomposition, routing and final synthesis.
/// `Light` serves intermediate summaries, query generation and column naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Primary,
    Light,
}

/// A function the model may choose to call, described by a JSON schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One completion call: prompt pair, sampling budget and offered functions.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Short tag naming the call site, used in logs and run history
    pub label: &'static str,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub tier: ModelTier,
    pub functions: Vec<FunctionSchema>,
}

impl CompletionRequest {
    pub fn new(label: &'static str, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            label,
            system: system.into(),
            user: user.into(),
            max_tokens: 1000,
            temperature: 0.4,
            tier: ModelTier::Primary,
            functions: Vec::new(),
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn light(mut self) -> Self {
        self.tier = ModelTier::Light;
        self
    }

    pub fn with_functions(mut self, functions: Vec<FunctionSchema>) -> Self {
        self.functions = functions;
        self
    }

    /// System prompt followed by the user prompt.
    pub fn messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }

    /// Offered functions in the chat-completions `tools` format (shared by
    /// OpenAI and Ollama).
    pub fn tools_payload(&self) -> Vec<serde_json::Value> {
        self.functions
            .iter()
            .map(|f| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": f.name,
                        "description": f.description,
                        "parameters": f.parameters,
                    }
                })
            })
            .collect()
    }
}

/// Response from an LLM provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LLMResponse {
    /// The model selected one of the offered functions
    ToolCall(ToolCall),

    /// Plain textual answer
    FinalAnswer(FinalAnswer),
}

/// Function call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,

    /// Arguments as a JSON string
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Build from a native function-call object whose arguments may arrive
    /// either as a JSON string (OpenAI) or as an object (Ollama).
    pub fn from_native(id: Option<&str>, name: &str, arguments: &serde_json::Value) -> Self {
        let arguments = match arguments {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4()));
        Self::new(id, name, arguments)
    }
}

/// Final answer from the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub content: String,
}

impl FinalAnswer {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// LLM Provider trait that all providers must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "ollama", "openai")
    fn name(&self) -> &str;

    /// Returns true if this is a local provider (e.g., Ollama), false for cloud providers
    fn is_local(&self) -> bool;

    /// Returns the estimated cost in USD for the given number of tokens.
    /// Local providers should return 0.0
    fn estimated_cost(&self, tokens: usize) -> f64;

    /// Run one completion.
    ///
    /// Providers return `LLMResponse::ToolCall` only when the request offered
    /// functions; text-only requests always yield `FinalAnswer`.
    async fn generate(&self, request: &CompletionRequest) -> Result<LLMResponse>;

    /// Check if the provider is currently healthy and available
    async fn check_health(&self) -> bool {
        true
    }
}

/// Recover a function call from models that answer in text instead of
/// native tool calls.
///
/// Handles multiple LLM output formats:
/// 1. Raw JSON: `{"function": "...", "arguments": {...}}`
/// 2. Fenced JSON (with or without trailing text): ` ```json\n{...}\n``` `
/// 3. `<tool_call>name({...})</tool_call>` XML markers
/// 4. JSON embedded in prose: scans for `{"function":` anywhere
pub fn parse_tool_calls(content: &str) -> Option<ToolCall> {
    let trimmed = content.trim();

    // Pattern 1: Raw JSON (entire content is valid JSON with "function" key)
    if let Some(tc) = try_parse_function_json(trimmed) {
        return Some(tc);
    }

    // Pattern 2: Extract from markdown code fences (even with trailing text)
    if let Some(inner) = extract_fenced_json(trimmed) {
        if let Some(tc) = try_parse_function_json(inner.trim()) {
            return Some(tc);
        }
    }

    // Pattern 3: <tool_call>name({...})</tool_call> XML markers
    if let Some(tc) = parse_marker_call(trimmed) {
        return Some(tc);
    }

    // Pattern 4: Scan for {"function": anywhere in the content (LLM mixed prose + JSON)
    if let Some(pos) = trimmed.find("{\"function\"") {
        let candidate = &trimmed[pos..];
        // Find matching closing brace by counting depth
        if let Some(json_str) = extract_balanced_json(candidate) {
            if let Some(tc) = try_parse_function_json(json_str) {
                return Some(tc);
            }
        }
    }

    None
}

/// `<tool_call>name(args)</tool_call>`. The closing tag and the closing
/// parenthesis are only searched after their openers.
fn parse_marker_call(content: &str) -> Option<ToolCall> {
    const OPEN: &str = "<tool_call>";
    let after_open = &content[content.find(OPEN)? + OPEN.len()..];
    let tool_content = &after_open[..after_open.find("</tool_call>")?];

    let paren_pos = tool_content.find('(')?;
    let tool_name = tool_content[..paren_pos].trim();
    if tool_name.is_empty() {
        return None;
    }
    let rest = &tool_content[paren_pos + 1..];
    let arguments = &rest[..rest.rfind(')').unwrap_or(rest.len())];

    Some(ToolCall::new(
        format!("call_{}", uuid::Uuid::new_v4()),
        tool_name,
        arguments,
    ))
}

/// Try to parse a string as a `{"function": "...", "arguments": {...}}` tool call.
fn try_parse_function_json(s: &str) -> Option<ToolCall> {
    let json: serde_json::Value = serde_json::from_str(s).ok()?;
    let function = json.get("function")?.as_str()?;
    let arguments = json.get("arguments")?;
    Some(ToolCall::new(
        format!("call_{}", uuid::Uuid::new_v4()),
        function,
        arguments.to_string(),
    ))
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
/// Returns `None` if no fenced block is found.
fn extract_fenced_json(content: &str) -> Option<&str> {
    // Find opening fence
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    // Find closing fence after the body starts
    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_request_defaults() {
        let req = CompletionRequest::new("triage", "sys", "usr");
        assert_eq!(req.max_tokens, 1000);
        assert!((req.temperature - 0.4).abs() < f32::EPSILON);
        assert_eq!(req.tier, ModelTier::Primary);
        assert!(req.functions.is_empty());

        let messages = req.messages();
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[1].content, "usr");
    }

    #[test]
    fn test_tools_payload_shape() {
        let req = CompletionRequest::new("route", "s", "u").with_functions(vec![FunctionSchema {
            name: "web_research".into(),
            description: "search".into(),
            parameters: serde_json::json!({"type": "object"}),
        }]);
        let tools = req.tools_payload();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["type"], "function");
        assert_eq!(tools[0]["function"]["name"], "web_research");
    }

    #[test]
    fn test_tool_call_from_native_arguments() {
        let as_string = serde_json::json!("{\"profile_url\":\"https://x\"}");
        let tc = ToolCall::from_native(Some("call_1"), "profile_lookup", &as_string);
        assert_eq!(tc.id, "call_1");
        assert_eq!(tc.arguments, r#"{"profile_url":"https://x"}"#);

        let as_object = serde_json::json!({"profile_url": "https://x"});
        let tc = ToolCall::from_native(None, "profile_lookup", &as_object);
        assert!(tc.id.starts_with("call_"));
        assert_eq!(tc.arguments, r#"{"profile_url":"https://x"}"#);
    }

    #[test]
    fn test_parse_tool_calls_fenced() {
        let content = "Calling:\n```json\n{\"function\": \"web_research\", \"arguments\": {\"sub_task\": \"x\"}}\n```\ndone";
        let tc = parse_tool_calls(content).unwrap();
        assert_eq!(tc.name, "web_research");
        assert!(tc.arguments.contains("sub_task"));
    }

    #[test]
    fn test_parse_tool_calls_marker_format() {
        let content = r#"<tool_call>company_lookup({"company_names": ["Acme"]})</tool_call>"#;
        let tc = parse_tool_calls(content).unwrap();
        assert_eq!(tc.name, "company_lookup");
        assert!(tc.arguments.contains("Acme"));
    }

    #[test]
    fn test_parse_tool_calls_misordered_markers() {
        // Closing tag before the opening one: no complete call
        assert!(parse_tool_calls("</tool_call> then <tool_call>web_research({})").is_none());

        // A ')' before the '(' is part of the name, never an argument bound
        let tc = parse_tool_calls("<tool_call>a)b(c</tool_call>").unwrap();
        assert_eq!(tc.name, "a)b");
        assert_eq!(tc.arguments, "c");

        assert!(parse_tool_calls("<tool_call>({})</tool_call>").is_none());
    }

    #[test]
    fn test_parse_tool_calls_no_match() {
        assert!(parse_tool_calls("Acme was founded in 1999.").is_none());
    }

    #[test]
    fn test_llm_response_serialization() {
        let tool_call = LLMResponse::ToolCall(ToolCall::new("id", "name", "{}"));
        let json = serde_json::to_string(&tool_call).unwrap();
        assert!(json.contains(r#""type":"tool_call"#));

        let final_answer = LLMResponse::FinalAnswer(FinalAnswer::new("answer"));
        let json = serde_json::to_string(&final_answer).unwrap();
        assert!(json.contains(r#""type":"final_answer"#));
    }
}
