//! Retrieval capabilities
//!
//! The three information sources a sub-task can be routed to:
//!
//! - `company_lookup`: structured company data, cache first ([`company`])
//! - `web_research`: search, fetch, summarize ([`web`])
//! - `profile_lookup`: stored profile by URL ([`profile`])
//!
//! The model selects a capability through a function call. Arguments are
//! validated into a [`CapabilityCall`] before anything runs. Capabilities
//! never fail structurally: every problem degrades into descriptive text via
//! [`CapabilityOutcome`].

use crate::conductor::context::RunContext;
use crate::llm::{FunctionSchema, ToolCall};
use async_trait::async_trait;
use serde_json::{json, Value};

pub mod company;
pub mod extract;
pub mod profile;
pub mod summarize;
pub mod web;

pub use company::CompanyLookup;
pub use extract::EntityProfile;
pub use profile::ProfileLookup;
pub use summarize::Summarizer;
pub use web::{RetrievalPolicy, WebResearch};

pub const COMPANY_LOOKUP: &str = "company_lookup";
pub const WEB_RESEARCH: &str = "web_research";
pub const PROFILE_LOOKUP: &str = "profile_lookup";

/// A validated capability selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityCall {
    CompanyLookup { company_names: Vec<String> },
    WebResearch { sub_task: String },
    ProfileLookup { profile_url: String },
}

/// Rejected function call from the routing model
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("unknown capability '{0}'")]
    UnknownCapability(String),

    #[error("invalid arguments for {capability}: {reason}")]
    InvalidArguments { capability: String, reason: String },
}

fn invalid(capability: &str, reason: impl Into<String>) -> CallError {
    CallError::InvalidArguments {
        capability: capability.to_string(),
        reason: reason.into(),
    }
}

fn required_string(args: &Value, capability: &str, key: &str) -> Result<String, CallError> {
    match args.get(key) {
        None | Some(Value::Null) => Err(invalid(capability, format!("missing '{}'", key))),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(invalid(capability, format!("'{}' is empty", key))),
        Some(_) => Err(invalid(capability, format!("'{}' must be a string", key))),
    }
}

impl CapabilityCall {
    /// Validate a model-issued function call against the capability schemas.
    pub fn from_tool_call(call: &ToolCall) -> Result<Self, CallError> {
        let name = call.name.as_str();
        if ![COMPANY_LOOKUP, WEB_RESEARCH, PROFILE_LOOKUP].contains(&name) {
            return Err(CallError::UnknownCapability(call.name.clone()));
        }

        let args: Value = serde_json::from_str(&call.arguments)
            .map_err(|e| invalid(name, format!("arguments are not JSON: {}", e)))?;
        if !args.is_object() {
            return Err(invalid(name, "arguments must be an object"));
        }

        match name {
            COMPANY_LOOKUP => {
                let items = match args.get("company_names") {
                    None | Some(Value::Null) => {
                        return Err(invalid(name, "missing 'company_names'"))
                    }
                    Some(Value::Array(items)) => items,
                    Some(_) => return Err(invalid(name, "'company_names' must be an array")),
                };

                let mut company_names = Vec::with_capacity(items.len());
                for item in items {
                    let s = item
                        .as_str()
                        .ok_or_else(|| invalid(name, "'company_names' must contain strings"))?;
                    if !s.trim().is_empty() {
                        company_names.push(s.trim().to_string());
                    }
                }
                if company_names.is_empty() {
                    return Err(invalid(name, "'company_names' is empty"));
                }

                Ok(CapabilityCall::CompanyLookup { company_names })
            }
            WEB_RESEARCH => Ok(CapabilityCall::WebResearch {
                sub_task: required_string(&args, name, "sub_task")?,
            }),
            _ => Ok(CapabilityCall::ProfileLookup {
                profile_url: required_string(&args, name, "profile_url")?,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CapabilityCall::CompanyLookup { .. } => COMPANY_LOOKUP,
            CapabilityCall::WebResearch { .. } => WEB_RESEARCH,
            CapabilityCall::ProfileLookup { .. } => PROFILE_LOOKUP,
        }
    }
}

/// Function schemas offered to the routing model, exactly one per capability.
pub fn schemas() -> Vec<FunctionSchema> {
    vec![
        FunctionSchema {
            name: COMPANY_LOOKUP.to_string(),
            description: "Look up structured company data: revenue range, total funding, \
                          employee count, description, IPOs, acquisitions, investments, \
                          location, founding date, industries and categories. Use only for \
                          those facts about named companies."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "company_names": {
                        "type": "array",
                        "items": {"type": "string"},
                        "minItems": 1,
                        "description": "Names of the companies to look up"
                    }
                },
                "required": ["company_names"]
            }),
        },
        FunctionSchema {
            name: WEB_RESEARCH.to_string(),
            description: "Search the web, read the top pages and summarize what they say. \
                          Use for anything structured company data cannot answer."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "sub_task": {
                        "type": "string",
                        "description": "The research instruction to answer"
                    }
                },
                "required": ["sub_task"]
            }),
        },
        FunctionSchema {
            name: PROFILE_LOOKUP.to_string(),
            description: "Read the stored profile for a professional profile URL. Call only \
                          when the sub-task contains such a URL."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "profile_url": {
                        "type": "string",
                        "description": "The profile URL exactly as it appears in the sub-task"
                    }
                },
                "required": ["profile_url"]
            }),
        },
    ]
}

/// Result of one capability invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityOutcome {
    /// Information was retrieved and summarized
    Found(String),
    /// Nothing matched; the text says what was missing
    Missing(String),
    /// A collaborator failed; the text carries whatever could be salvaged
    Degraded(String),
}

impl CapabilityOutcome {
    pub fn text(&self) -> &str {
        match self {
            CapabilityOutcome::Found(t)
            | CapabilityOutcome::Missing(t)
            | CapabilityOutcome::Degraded(t) => t,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            CapabilityOutcome::Found(t)
            | CapabilityOutcome::Missing(t)
            | CapabilityOutcome::Degraded(t) => t,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CapabilityOutcome::Found(_) => "found",
            CapabilityOutcome::Missing(_) => "missing",
            CapabilityOutcome::Degraded(_) => "degraded",
        }
    }
}

/// Runs a validated capability call for a sub-task.
#[async_trait]
pub trait CapabilityInvoker: Send + Sync {
    async fn invoke(
        &self,
        call: &CapabilityCall,
        sub_task: &str,
        context: &RunContext,
    ) -> CapabilityOutcome;
}

/// The production capability set
pub struct Capabilities {
    company: CompanyLookup,
    web: WebResearch,
    profile: ProfileLookup,
}

impl Capabilities {
    pub fn new(company: CompanyLookup, web: WebResearch, profile: ProfileLookup) -> Self {
        Self {
            company,
            web,
            profile,
        }
    }
}

#[async_trait]
impl CapabilityInvoker for Capabilities {
    async fn invoke(
        &self,
        call: &CapabilityCall,
        sub_task: &str,
        context: &RunContext,
    ) -> CapabilityOutcome {
        let outcome = match call {
            CapabilityCall::CompanyLookup { company_names } => {
                self.company.run(company_names, sub_task).await
            }
            CapabilityCall::WebResearch { sub_task } => self.web.run(sub_task, context).await,
            CapabilityCall::ProfileLookup { profile_url } => self.profile.run(profile_url).await,
        };

        tracing::info!(capability = call.name(), outcome = outcome.kind(), "Capability finished");
        outcome
    }
}

/// Normalize an entity name for alias lookups: trimmed, inner whitespace
/// collapsed, lowercased.
pub fn normalize_entity_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &str) -> ToolCall {
        ToolCall::new("call_1", name, args)
    }

    #[test]
    fn test_schemas_cover_every_capability() {
        let names: Vec<String> = schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec![COMPANY_LOOKUP, WEB_RESEARCH, PROFILE_LOOKUP]);
    }

    #[test]
    fn test_valid_company_lookup() {
        let parsed =
            CapabilityCall::from_tool_call(&call(COMPANY_LOOKUP, r#"{"company_names": [" Acme Corp ", ""]}"#))
                .unwrap();
        assert_eq!(
            parsed,
            CapabilityCall::CompanyLookup {
                company_names: vec!["Acme Corp".to_string()]
            }
        );
    }

    #[test]
    fn test_rejects_unknown_capability() {
        let err = CapabilityCall::from_tool_call(&call("linkedin_scraper", "{}")).unwrap_err();
        assert_eq!(err, CallError::UnknownCapability("linkedin_scraper".into()));
    }

    #[test]
    fn test_rejects_wrong_types_and_missing_fields() {
        assert!(CapabilityCall::from_tool_call(&call(COMPANY_LOOKUP, r#"{"company_names": "Acme"}"#)).is_err());
        assert!(CapabilityCall::from_tool_call(&call(COMPANY_LOOKUP, r#"{"company_names": []}"#)).is_err());
        assert!(CapabilityCall::from_tool_call(&call(COMPANY_LOOKUP, r#"{"company_names": [1]}"#)).is_err());
        assert!(CapabilityCall::from_tool_call(&call(WEB_RESEARCH, r#"{}"#)).is_err());
        assert!(CapabilityCall::from_tool_call(&call(WEB_RESEARCH, r#"{"sub_task": "  "}"#)).is_err());
        assert!(CapabilityCall::from_tool_call(&call(PROFILE_LOOKUP, r#"{"profile_url": 3}"#)).is_err());
        assert!(CapabilityCall::from_tool_call(&call(PROFILE_LOOKUP, "not json")).is_err());
        assert!(CapabilityCall::from_tool_call(&call(PROFILE_LOOKUP, "[]")).is_err());
    }

    #[test]
    fn test_normalize_entity_name() {
        assert_eq!(normalize_entity_name("  Acme   Corp\t"), "acme corp");
    }
}
