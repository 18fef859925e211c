//! Stored profile lookup by exact profile URL

use super::summarize::Summarizer;
use super::CapabilityOutcome;
use crate::db::{ProfileRecord, ProfileRepository};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Render a list-ish profile value as text; `None` when empty.
fn render_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(render_value)
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(map) if map.is_empty() => return None,
        other => other.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn present(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// One sentence per present, non-empty field.
pub fn profile_dump(record: &ProfileRecord) -> String {
    let lines: [(&str, Option<String>); 10] = [
        ("The name of the person is", present(&record.name)),
        ("The location of the person is", present(&record.location)),
        ("The description of the person is", present(&record.description)),
        ("The title of the person is", present(&record.title)),
        (
            "The experience of the person is",
            record.experience.as_ref().and_then(render_value),
        ),
        (
            "The education of the person is",
            record.education.as_ref().and_then(render_value),
        ),
        (
            "The skills of the person are",
            record.skills.as_ref().and_then(render_value),
        ),
        (
            "The certifications of the person are",
            record.certificates.as_ref().and_then(render_value),
        ),
        ("The email of the person is", present(&record.email)),
        (
            "The extracted skills of the person are",
            record.extracted_skills.as_ref().and_then(render_value),
        ),
    ];

    lines
        .into_iter()
        .filter_map(|(lead, value)| value.map(|v| format!("{} {}.", lead, v)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct ProfileLookup {
    profiles: ProfileRepository,
    summarizer: Arc<Summarizer>,
}

impl ProfileLookup {
    pub fn new(profiles: ProfileRepository, summarizer: Arc<Summarizer>) -> Self {
        Self {
            profiles,
            summarizer,
        }
    }

    pub async fn run(&self, profile_url: &str) -> CapabilityOutcome {
        let record = match self.profiles.find_by_url(profile_url.trim()).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return CapabilityOutcome::Missing(format!(
                    "No stored profile found for {}.",
                    profile_url
                ))
            }
            Err(e) => {
                warn!("Profile store lookup failed: {:#}", e);
                return CapabilityOutcome::Degraded(format!(
                    "The profile store could not be read for {}.",
                    profile_url
                ));
            }
        };

        let dump = profile_dump(&record);
        if dump.is_empty() {
            return CapabilityOutcome::Missing(format!(
                "The stored profile for {} has no details.",
                profile_url
            ));
        }

        match self.summarizer.summarize_profile(&dump).await {
            Ok(summary) => CapabilityOutcome::Found(summary),
            Err(e) => {
                warn!("Profile summarization failed: {}", e);
                CapabilityOutcome::Degraded(dump)
            }
        }
    }
}
