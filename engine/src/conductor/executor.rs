//! Capability Dispatcher
//!
//! Routes one sub-task: the model either answers it in text or selects one
//! of the capabilities, whose validated call is then run. Only capability
//! results enter the run context.

use crate::capabilities::{self, CapabilityCall, CapabilityInvoker};
use crate::conductor::context::RunContext;
use crate::conductor::types::{DispatchError, SubTask};
use crate::llm::router::LLMRouter;
use crate::llm::{CompletionRequest, LLMResponse};
use std::sync::Arc;

/// Outcome of a dispatch that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// Direct-answer sub-task, passed through to synthesis untouched
    Passthrough(String),
    /// The routing model answered in text
    Answered(String),
    /// A capability ran and its result was appended to the context
    Capability { name: &'static str, result: String },
}

impl Dispatched {
    pub fn text(&self) -> &str {
        match self {
            Dispatched::Passthrough(t) | Dispatched::Answered(t) => t,
            Dispatched::Capability { result, .. } => result,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Dispatched::Passthrough(t) | Dispatched::Answered(t) => t,
            Dispatched::Capability { result, .. } => result,
        }
    }
}

pub struct Dispatcher {
    router: Arc<LLMRouter>,
    capabilities: Arc<dyn CapabilityInvoker>,
}

impl Dispatcher {
    pub fn new(router: Arc<LLMRouter>, capabilities: Arc<dyn CapabilityInvoker>) -> Self {
        Self {
            router,
            capabilities,
        }
    }

    /// Dispatch a single sub-task against the current run context.
    pub async fn dispatch(
        &self,
        sub_task: &SubTask,
        context: &mut RunContext,
    ) -> Result<Dispatched, DispatchError> {
        let text = match sub_task {
            SubTask::DirectAnswer(text) => {
                tracing::debug!("Direct answer, no routing needed");
                return Ok(Dispatched::Passthrough(text.clone()));
            }
            SubTask::Research(text) => text,
        };

        let request = Self::routing_request(text, context);
        let (response, provider) = self
            .router
            .call(&request)
            .await
            .map_err(DispatchError::Routing)?;

        let tool_call = match response {
            LLMResponse::FinalAnswer(answer) => {
                tracing::info!(provider = %provider, "Sub-task answered without a capability");
                return Ok(Dispatched::Answered(answer.content));
            }
            LLMResponse::ToolCall(call) => call,
        };

        let call = CapabilityCall::from_tool_call(&tool_call)?;
        tracing::info!(
            provider = %provider,
            capability = call.name(),
            "Routing sub-task to capability"
        );

        let outcome = self.capabilities.invoke(&call, text, context).await;
        let result = outcome.into_text();
        context.append(sub_task, &result);

        Ok(Dispatched::Capability {
            name: call.name(),
            result,
        })
    }

    fn routing_request(sub_task: &str, context: &RunContext) -> CompletionRequest {
        let system = "You decide how to handle one research sub-task. You can call:\n\
             1. company_lookup: structured company data only (revenue, funding, employee \
             count, description, IPOs, acquisitions, investments, location, founding date, \
             industries, categories).\n\
             2. web_research: web search and page summaries for anything company data \
             cannot answer.\n\
             3. profile_lookup: a stored professional profile. Call it only when the \
             sub-task contains a profile URL.\n\
             If the sub-task can be answered from your own knowledge, the context provided, \
             or information already present in it, answer directly without calling anything.";

        let mut user = format!("Sub-task: '{}'.", sub_task);
        if !context.is_empty() {
            user.push_str(&format!(" Context: '{}'.", context.as_str()));
        }
        user.push_str(" Determine and execute the appropriate action.");
        if !context.is_empty() {
            user.push_str(" Use the context provided to choose the arguments.");
        }

        CompletionRequest::new("route", system, user)
            .max_tokens(300)
            .temperature(0.4)
            .with_functions(capabilities::schemas())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_request_offers_all_capabilities() {
        let request = Dispatcher::routing_request("Find Acme's revenue", &RunContext::new());
        assert_eq!(request.label, "route");
        assert_eq!(request.max_tokens, 300);
        assert_eq!(request.functions.len(), 3);
        assert!(!request.user.contains("Context:"));
    }

    #[test]
    fn test_routing_request_carries_context() {
        let mut ctx = RunContext::new();
        ctx.append(&SubTask::Research("a".into()), "Acme is based in Berlin.");
        let request = Dispatcher::routing_request("Find Acme's CEO", &ctx);
        assert!(request.user.contains("Acme is based in Berlin."));
        assert!(request.user.contains("Find Acme's CEO"));
    }

    #[test]
    fn test_dispatched_text() {
        let d = Dispatched::Capability {
            name: capabilities::WEB_RESEARCH,
            result: "found".into(),
        };
        assert_eq!(d.text(), "found");
        assert_eq!(Dispatched::Answered("x".into()).into_text(), "x");
    }
}
