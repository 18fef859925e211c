//! Conductor Types
//!
//! Core data structures for one research run: the query, the sub-tasks it
//! decomposes into, per-sub-task results and the final report.

use crate::capabilities::CallError;
use crate::llm::LLMError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The user's free-text request. Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query(String);

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of work produced by decomposition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum SubTask {
    /// The model can answer the whole query from its own knowledge.
    /// Carries the query text; no capability runs for it.
    DirectAnswer(String),

    /// A single retrieval instruction
    Research(String),
}

impl SubTask {
    pub fn text(&self) -> &str {
        match self {
            SubTask::DirectAnswer(t) | SubTask::Research(t) => t,
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, SubTask::DirectAnswer(_))
    }
}

impl fmt::Display for SubTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubTask::DirectAnswer(t) => write!(f, "Direct Answer: {}", t),
            SubTask::Research(t) => f.write_str(t),
        }
    }
}

/// What one sub-task produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTaskResult {
    pub sub_task: SubTask,
    pub result: String,
    /// False when the dispatch failed and `result` is an error string
    pub succeeded: bool,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub query: Query,
    pub results: Vec<SubTaskResult>,
    pub answer: String,
    /// Provider that produced the final synthesis, if synthesis succeeded
    pub provider: Option<String>,
    pub duration_ms: i64,
}

impl RunReport {
    pub fn sub_tasks(&self) -> impl Iterator<Item = &SubTask> {
        self.results.iter().map(|r| &r.sub_task)
    }
}

/// Failure to dispatch a single sub-task
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("routing request failed: {0}")]
    Routing(#[source] LLMError),

    #[error(transparent)]
    Call(#[from] CallError),
}

/// Run-level errors
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    /// The completion service could not be reached while decomposing the
    /// query. Nothing can run without sub-tasks.
    #[error("completion service unavailable during decomposition: {0}")]
    FatalCompletion(#[source] LLMError),

    #[error("query is empty")]
    EmptyQuery,
}

impl From<ResearchError> for sdk::EngineError {
    fn from(e: ResearchError) -> Self {
        match e {
            ResearchError::FatalCompletion(LLMError::Timeout) => sdk::EngineError::LLMTimeout,
            ResearchError::FatalCompletion(LLMError::ProviderUnavailable(message)) => {
                sdk::EngineError::AllProvidersExhausted(message)
            }
            ResearchError::FatalCompletion(other) => {
                sdk::EngineError::LLMProvider(other.to_string())
            }
            ResearchError::EmptyQuery => {
                sdk::EngineError::InvalidQuery("query is empty".to_string())
            }
        }
    }
}
