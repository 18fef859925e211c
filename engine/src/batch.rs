//! CSV batch mode
//!
//! Runs a query template once per CSV row, substituting `{Column}`
//! placeholders with the row's values, and writes each answer into a new
//! column. Every row is an independent run with its own context. Rows may
//! run concurrently up to `batch.concurrency`; output order always matches
//! input order.

use crate::conductor::{Orchestrator, Query};
use crate::llm::router::LLMRouter;
use crate::llm::CompletionRequest;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use regex::Regex;
use sdk::EngineError;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, OnceLock};

const FALLBACK_COLUMN: &str = "Answer";

fn placeholder_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{(.*?)\}").ok()).as_ref()
}

/// Column names referenced by `{...}` in the template, in order of first use.
pub fn placeholders(template: &str) -> Vec<String> {
    let Some(re) = placeholder_pattern() else {
        return Vec::new();
    };
    let mut names: Vec<String> = Vec::new();
    for cap in re.captures_iter(template) {
        let name = cap[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Substitute every placeholder with the row's value for that column.
///
/// Substitution is a single pass over the template, so braces inside cell
/// values are never expanded.
pub fn render_query(template: &str, headers: &[String], row: &[String]) -> String {
    let Some(re) = placeholder_pattern() else {
        return template.to_string();
    };
    re.replace_all(template, |caps: &regex::Captures| {
        headers
            .iter()
            .position(|h| *h == caps[1])
            .and_then(|i| row.get(i))
            .cloned()
            .unwrap_or_default()
    })
    .into_owned()
}

/// Clean a model-suggested column name and make it unique among `existing`.
///
/// Special characters are dropped. A taken name gets a numeric suffix.
pub fn unique_column_name(candidate: &str, existing: &[String]) -> String {
    let cleaned: String = candidate
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_')
        .collect();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let base = if cleaned.is_empty() {
        FALLBACK_COLUMN.to_string()
    } else {
        cleaned
    };

    let taken = |name: &str| existing.iter().any(|e| e.eq_ignore_ascii_case(name));
    if !taken(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let name = format!("{} {}", base, n);
        if !taken(&name) {
            return name;
        }
        n += 1;
    }
}

/// An in-memory CSV table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl BatchTable {
    pub fn from_reader<R: std::io::Read>(input: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(input);

        let headers: Vec<String> = reader
            .headers()
            .context("Failed to read CSV headers")?
            .iter()
            .map(|s| s.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read CSV row {}", i + 1))?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len().max(row.len()), String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn to_writer<W: std::io::Write>(&self, output: W) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(output);
        writer
            .write_record(&self.headers)
            .context("Failed to write CSV headers")?;
        for row in &self.rows {
            writer.write_record(row).context("Failed to write CSV row")?;
        }
        writer.flush().context("Failed to flush CSV output")?;
        Ok(())
    }

    /// Rewrite the file in place via a sibling temporary file.
    pub fn write(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("csv.tmp");
        let file = std::fs::File::create(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        self.to_writer(file)?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    /// Check every placeholder names an existing column.
    pub fn validate_template(&self, template: &str) -> Result<(), EngineError> {
        let names = placeholders(template);
        if names.is_empty() {
            return Err(EngineError::InvalidBatch(
                "template has no {column} placeholders".to_string(),
            ));
        }
        let missing: Vec<&str> = names
            .iter()
            .filter(|n| !self.headers.contains(n))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::InvalidBatch(format!(
                "unknown column(s) in template: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    pub fn add_column(&mut self, name: &str, values: Vec<String>) {
        let width = self.headers.len();
        self.headers.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.resize(width, String::new());
            row.push(value);
        }
    }
}

/// Per-batch counts
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub column: String,
    pub rows: usize,
    pub failed: usize,
}

pub struct BatchRunner {
    orchestrator: Arc<Orchestrator>,
    router: Arc<LLMRouter>,
    concurrency: usize,
}

impl BatchRunner {
    pub fn new(orchestrator: Arc<Orchestrator>, router: Arc<LLMRouter>, concurrency: usize) -> Self {
        Self {
            orchestrator,
            router,
            concurrency: concurrency.max(1),
        }
    }

    /// Ask the model for a short column name for the template's answers.
    pub async fn generate_column_name(&self, template: &str, existing: &[String]) -> String {
        let system = "You will be given a query. Reply with one short line of a few words that \
             can be used as a spreadsheet column name for the answer to the query. It must not \
             be one of the existing column names. Do not use special characters.";
        let user = format!(
            "Query: '{}'\nExisting Column Names: {}",
            template,
            existing.join(", ")
        );
        let request = CompletionRequest::new("column_name", system, user)
            .light()
            .max_tokens(50)
            .temperature(0.7);

        match self.router.complete_text(&request).await {
            Ok(name) => unique_column_name(&name, existing),
            Err(e) => {
                tracing::warn!("Column name generation failed: {}", e);
                unique_column_name(FALLBACK_COLUMN, existing)
            }
        }
    }

    /// Answer the template for every row and append the answers as a column.
    ///
    /// A row whose run fails gets `"Error: <message>"` in its cell.
    pub async fn run(
        &self,
        table: &mut BatchTable,
        template: &str,
        column: Option<&str>,
    ) -> Result<BatchSummary> {
        table.validate_template(template)?;

        let column = match column {
            Some(name) => unique_column_name(name, &table.headers),
            None => self.generate_column_name(template, &table.headers).await,
        };
        tracing::info!(rows = table.rows.len(), column = %column, "Starting batch");

        let headers = &table.headers;
        let orchestrator = &self.orchestrator;
        let answers: Vec<(String, bool)> = stream::iter(table.rows.iter().enumerate())
            .map(|(i, row)| {
                let query = Query::new(render_query(template, headers, row));
                async move {
                    tracing::info!(row = i + 1, query = %query, "Running batch row");
                    match orchestrator.run(&query).await {
                        Ok(report) => (report.answer, true),
                        Err(e) => {
                            tracing::warn!(row = i + 1, "Batch row failed: {}", e);
                            (format!("Error: {}", e), false)
                        }
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let failed = answers.iter().filter(|(_, ok)| !ok).count();
        let rows = answers.len();
        table.add_column(&column, answers.into_iter().map(|(a, _)| a).collect());

        Ok(BatchSummary {
            column,
            rows,
            failed,
        })
    }
}
