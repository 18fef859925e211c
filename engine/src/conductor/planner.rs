//! Task Decomposer
//!
//! Asks the model whether it can answer a query outright. If it says further
//! research is needed, asks for the smallest list of searchable sub-tasks.

use crate::conductor::types::{Query, ResearchError, SubTask};
use crate::llm::router::LLMRouter;
use crate::llm::{today, CompletionRequest};
use regex::Regex;
use std::sync::{Arc, OnceLock};

const RESEARCH_MARKER: &str = "further research";

fn list_marker() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        // "1.", "2)", "-", "*", "•", optionally followed by "Sub-task 1:"
        Regex::new(r"^(?:\d+[.)]|[-*•])\s*(?:(?i:sub[- ]?task)\s*\d*\s*[:.-]\s*)?").ok()
    })
    .as_ref()
}

/// Split a numbered or bulleted list into sub-task lines.
///
/// Blank lines are dropped; list markers and surrounding quotes are stripped.
pub fn parse_sub_tasks(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            let line = line.trim();
            let line = match list_marker() {
                Some(re) => re.replace(line, ""),
                None => line.into(),
            };
            line.trim()
                .trim_matches(|c| c == '"' || c == '\'' || c == '`')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// True when a triage reply asks for more research rather than answering.
pub fn needs_research(reply: &str) -> bool {
    reply.to_lowercase().contains(RESEARCH_MARKER)
}

pub struct TaskDecomposer {
    router: Arc<LLMRouter>,
}

impl TaskDecomposer {
    pub fn new(router: Arc<LLMRouter>) -> Self {
        Self { router }
    }

    /// Decompose a query into ordered sub-tasks.
    ///
    /// Fails only when the completion service is unreachable.
    pub async fn decompose(&self, query: &Query) -> Result<Vec<SubTask>, ResearchError> {
        let reply = self
            .router
            .complete_text(&Self::triage_request(query))
            .await
            .map_err(ResearchError::FatalCompletion)?;

        if !needs_research(&reply) {
            tracing::info!("Query can be answered directly");
            return Ok(vec![SubTask::DirectAnswer(query.as_str().to_string())]);
        }

        let listing = self
            .router
            .complete_text(&Self::decompose_request(query))
            .await
            .map_err(ResearchError::FatalCompletion)?;

        let lines = parse_sub_tasks(&listing);
        if lines.is_empty() {
            tracing::warn!("Decomposition produced no sub-tasks, researching the query as-is");
            return Ok(vec![SubTask::Research(query.as_str().to_string())]);
        }

        tracing::info!(count = lines.len(), "Query decomposed");
        Ok(lines.into_iter().map(SubTask::Research).collect())
    }

    fn triage_request(query: &Query) -> CompletionRequest {
        let system = format!(
            "You answer queries and decide when they need research. If you know the answer \
             from your training data, or the query only asks for information already present \
             in it, answer directly. If more information is needed, say that further research \
             is required. Answer with respect to today's date which is {}.",
            today()
        );
        let user = format!(
            "The user is asking about \"{}\". Reply with a very short summary of your \
             knowledge, one or two lines if possible. If further research is needed, state \
             that explicitly. Do not add anything else. Reply in plain text.",
            query
        );
        CompletionRequest::new("triage", system, user)
            .max_tokens(1000)
            .temperature(0.4)
    }

    fn decompose_request(query: &Query) -> CompletionRequest {
        let system = "You break a research request into the fewest high-level sub-tasks that \
             can each be sent to a web search directly. Each sub-task is one line. \
             Do not add verification, confirmation, comparison or compilation tasks, tasks \
             that need manual effort, tasks nobody asked for, or tasks such as finding an \
             official website. Combine similar sub-tasks. Never repeat a sub-task whose \
             information an earlier one already covers. When a profile URL must be visited, \
             use exactly one sub-task for it. A single sub-task is fine. \
             Return only a numbered list.";
        let user = format!("Break down the following task: '{}' into sub-tasks.", query);
        CompletionRequest::new("decompose", system, user)
            .max_tokens(1000)
            .temperature(0.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numbered_list() {
        let text = "1. Find the CEO of Acme Corp\n2) Find Acme Corp's total funding\n\n";
        assert_eq!(
            parse_sub_tasks(text),
            vec!["Find the CEO of Acme Corp", "Find Acme Corp's total funding"]
        );
    }

    #[test]
    fn test_parse_bullets_and_labels() {
        let text = "- \"Look up Acme\"\n* Sub-task 2: Search news about Acme\n• Visit https://linkedin.com/in/jane";
        assert_eq!(
            parse_sub_tasks(text),
            vec![
                "Look up Acme",
                "Search news about Acme",
                "Visit https://linkedin.com/in/jane"
            ]
        );
    }

    #[test]
    fn test_parse_keeps_inner_numbers() {
        assert_eq!(
            parse_sub_tasks("Find the top 5 investors of Acme"),
            vec!["Find the top 5 investors of Acme"]
        );
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_sub_tasks("\n  \n1. \n").is_empty());
    }

    #[test]
    fn test_needs_research_is_case_insensitive() {
        assert!(needs_research("FURTHER RESEARCH is required."));
        assert!(needs_research("This needs further research"));
        assert!(!needs_research("Paris is the capital of France."));
    }
}
