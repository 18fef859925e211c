//! Summarization calls shared by the capabilities and the final synthesis

use crate::llm::router::LLMRouter;
use crate::llm::{today, CompletionRequest, Result};
use std::sync::Arc;

pub struct Summarizer {
    router: Arc<LLMRouter>,
}

impl Summarizer {
    pub fn new(router: Arc<LLMRouter>) -> Self {
        Self { router }
    }

    /// Answer `query` from a large, possibly scraped, body of text.
    pub async fn summarize(&self, query: &str, text: &str) -> Result<String> {
        let system = format!(
            "You will be given a query and a body of text, often scraped from web pages and \
             full of unrelated material. Read only the parts relevant to the query and answer it \
             as a clean summary of what the text says. Do not make it look scraped. If the text \
             names the URL it came from, cite that URL; never mention a source that is not \
             given. Respond in plain text only. Today's date is {}.",
            today()
        );
        let request = CompletionRequest::new(
            "summarize",
            system,
            format!("query: \"{}\"\n\ntext: {}", query, text),
        )
        .light()
        .max_tokens(2000)
        .temperature(0.2);

        self.router.complete_text(&request).await
    }

    /// Summarize a stored profile dump without dropping enumerable details.
    pub async fn summarize_profile(&self, profile_dump: &str) -> Result<String> {
        let system = format!(
            "You summarize stored professional profiles. From the profile data, write a concise, \
             accurate summary covering location, experience, skills, education, job titles, \
             certifications, companies, emails and industries. List every skill, position, \
             school, certification, company and email that appears in the data; omit anything \
             that is missing rather than guessing. Today's date is {}.",
            today()
        );
        let request = CompletionRequest::new(
            "summarize_profile",
            system,
            format!("Profile data: '{}'.", profile_dump),
        )
        .light()
        .max_tokens(1000)
        .temperature(0.5);

        self.router.complete_text(&request).await
    }

    /// Final answer for the original query from the ordered sub-task results.
    /// Returns the answer and the provider that wrote it.
    pub async fn synthesize(&self, query: &str, findings: &str) -> Result<(String, String)> {
        let system = format!(
            "You will be given a query and the findings of every research step taken for it. \
             Answer the query from those findings as a well-formatted summary. If the answer fits \
             in one or two lines, give only one or two lines. When the findings include URLs, end \
             with a line `Sources: <urls>`; when they do not, leave sources out entirely and never \
             say that a source is unavailable. Respond in plain text only: no markdown headings, \
             bold or tables. Today's date is {}.\n\n\
             Example of the expected shape:\n\n\
             Acme Corp offers the following products:\n\
             1. Anvil Pro - a forged steel anvil line\n\
             2. Rocket Skates - consumer propulsion gear\n\
             Sources: https://www.acme.example/",
            today()
        );
        let request = CompletionRequest::new(
            "synthesize",
            system,
            format!("query: \"{}\"\n\ntext: {}", query, findings),
        )
        .max_tokens(2000)
        .temperature(0.2);

        self.router.complete_text_with_provider(&request).await
    }
}
