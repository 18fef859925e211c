//! Run Context
//!
//! Append-only text buffer shared by the sub-tasks of one run. Later
//! sub-tasks are routed and searched with whatever earlier ones found.
//! A fresh context is created for every query; nothing carries over.

use crate::conductor::types::SubTask;

#[derive(Debug, Clone, Default)]
pub struct RunContext {
    buffer: String,
    entries: Vec<String>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a capability result. No dedup and no bound.
    pub fn append(&mut self, sub_task: &SubTask, result: &str) {
        tracing::debug!(
            sub_task = sub_task.text(),
            bytes = result.len(),
            "Appending to run context"
        );
        self.buffer.push('\n');
        self.buffer.push_str(result);
        self.entries.push(result.to_string());
    }

    /// The accumulated text, verbatim.
    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Individual results in append order
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}
