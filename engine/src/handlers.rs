//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - ask: research one query
//! - batch: answer a query template per CSV row
//! - history / replay: inspect recorded runs
//! - profiles, cache: inspect and load the local stores
//! - secrets: store API keys in the keychain
//! - config show, doctor: configuration and provider checks
//!
//! [`Engine::build`] wires providers, capabilities and the orchestrator from
//! a [`Config`] and a [`SecretCache`].

use anyhow::{Context, Result};
use serde_json::json;
use std::io::BufRead;
use std::path::Path;
use sdk::EngineError;
use std::sync::Arc;
use std::time::Duration;

use crate::batch::{BatchRunner, BatchTable};
use crate::capabilities::{
    Capabilities, CompanyLookup, EntityProfile, ProfileLookup, RetrievalPolicy, Summarizer,
    WebResearch,
};
use crate::conductor::{Orchestrator, Query};
use crate::config::Config;
use crate::db::profiles::ProfileRecord;
use crate::db::Database;
use crate::llm::ollama::OllamaProvider;
use crate::llm::openai::OpenAIProvider;
use crate::llm::router::LLMRouter;
use crate::llm::LLMProvider;
use crate::providers::{CrunchbaseClient, GoogleSearch, ScraperApiFetcher};
use crate::secrets::{SecretCache, SecretManager, OPENAI_API_KEY, REQUIRED_KEYS};

/// Keychain service name for all Delve keys
pub const SECRET_SERVICE: &str = "delve";

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// A fully wired research engine
pub struct Engine {
    pub database: Database,
    pub router: Arc<LLMRouter>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Engine {
    /// Open the database and wire every collaborator from configuration.
    pub async fn build(config: &Config, secrets: Arc<SecretCache>) -> Result<Self> {
        let database = Database::new(&config.db_path())
            .await
            .context("Failed to open database")?;

        let router = Arc::new(LLMRouter::new(
            completion_providers(config, &secrets),
            Arc::new(config.llm.clone()),
        ));
        let summarizer = Arc::new(Summarizer::new(Arc::clone(&router)));
        let timeout = Duration::from_secs(config.retrieval.request_timeout_secs);

        let directory = Arc::new(CrunchbaseClient::new(
            config.providers.crunchbase_base_url.clone(),
            Arc::clone(&secrets),
            timeout,
        ));
        let search = Arc::new(GoogleSearch::new(
            config.providers.search_base_url.clone(),
            config.providers.search_engine_id.clone(),
            Arc::clone(&secrets),
            timeout,
        ));
        let fetcher = Arc::new(ScraperApiFetcher::new(
            config.providers.scraper_base_url.clone(),
            Arc::clone(&secrets),
            timeout,
        ));

        let capabilities = Capabilities::new(
            CompanyLookup::new(
                directory,
                database.entity_cache(),
                Arc::clone(&summarizer),
                config.cache.write_back,
            ),
            WebResearch::new(
                Arc::clone(&router),
                search,
                fetcher,
                Arc::clone(&summarizer),
                RetrievalPolicy::from_config(&config.providers, &config.retrieval),
            ),
            ProfileLookup::new(database.profiles(), Arc::clone(&summarizer)),
        );

        let orchestrator = Orchestrator::new(Arc::clone(&router), Arc::new(capabilities), summarizer)
            .with_history(database.runs());

        Ok(Self {
            database,
            router,
            orchestrator: Arc::new(orchestrator),
        })
    }
}

/// Completion providers in registration order. Ollama needs no key and is
/// always registered; OpenAI only when its key resolves.
pub fn completion_providers(config: &Config, secrets: &Arc<SecretCache>) -> Vec<Box<dyn LLMProvider>> {
    let mut providers: Vec<Box<dyn LLMProvider>> = vec![Box::new(OllamaProvider::new(
        config.llm.ollama.base_url.clone(),
        config.llm.ollama.model.clone(),
    ))];

    if secrets.is_available(OPENAI_API_KEY) {
        providers.push(Box::new(OpenAIProvider::new(
            config.llm.openai.clone(),
            Arc::clone(secrets),
        )));
    } else {
        tracing::debug!("OpenAI key not configured, using local models only");
    }

    providers
}

fn default_secrets() -> Arc<SecretCache> {
    Arc::new(SecretCache::new(Arc::new(SecretManager::new(SECRET_SERVICE))))
}

fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Research a single query
pub async fn handle_ask(query: String, config: &Config, format: OutputFormat) -> Result<()> {
    let engine = Engine::build(config, default_secrets()).await?;
    let report = engine
        .orchestrator
        .run(&Query::new(query))
        .await
        .map_err(EngineError::from)
        .context("Research run failed")?;

    match format {
        OutputFormat::Text => {
            println!("{}", report.answer);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    engine.database.close().await?;
    Ok(())
}

/// Answer a template for every CSV row and rewrite the file
pub async fn handle_batch(
    csv: &Path,
    template: &str,
    column: Option<&str>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let mut table = BatchTable::read(csv)?;
    // Fail before any model call when the template does not fit the file
    table.validate_template(template)?;

    let engine = Engine::build(config, default_secrets()).await?;
    let runner = BatchRunner::new(
        Arc::clone(&engine.orchestrator),
        Arc::clone(&engine.router),
        config.batch.concurrency,
    );

    let summary = runner.run(&mut table, template, column).await?;
    table.write(csv)?;

    match format {
        OutputFormat::Text => {
            println!(
                "Answered {} row(s) into column '{}' of {}",
                summary.rows,
                summary.column,
                csv.display()
            );
            if summary.failed > 0 {
                println!("{} row(s) failed; their cells hold the error.", summary.failed);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    engine.database.close().await?;
    Ok(())
}

/// Show recent runs
pub async fn handle_history(limit: usize, config: &Config, format: OutputFormat) -> Result<()> {
    let database = Database::new(&config.db_path())
        .await
        .context("Failed to open database")?;

    let runs = database
        .runs()
        .recent_runs(limit as i64)
        .await
        .context("Failed to fetch run history")?;

    match format {
        OutputFormat::Text => {
            if runs.is_empty() {
                println!("No runs in history");
                return Ok(());
            }

            println!("Run History (last {} runs):", limit);
            println!();

            for run in runs {
                println!("Run ID: {}", run.id);
                println!("  Query: {}", run.query);
                println!("  Status: {}", run.status.as_str());

                if let Some(provider) = run.provider_used {
                    println!("  Provider: {}", provider);
                }

                if let Some(duration) = run.duration_ms {
                    println!("  Duration: {}ms", duration);
                }

                println!("  Created: {}", format_timestamp(run.created_at));
                println!();
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "runs": runs,
                "count": runs.len(),
                "limit": limit
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Show every recorded step of a run
pub async fn handle_replay(run_id: String, config: &Config, format: OutputFormat) -> Result<()> {
    let database = Database::new(&config.db_path())
        .await
        .context("Failed to open database")?;
    let runs = database.runs();

    let run = runs
        .get_run(&run_id)
        .await
        .context("Failed to fetch run")?
        .ok_or_else(|| anyhow::anyhow!("Run not found: {}", run_id))?;

    let steps = runs
        .get_steps(&run_id)
        .await
        .context("Failed to fetch run steps")?;

    match format {
        OutputFormat::Text => {
            println!("Run Replay: {}", run_id);
            println!();
            println!("Query: {}", run.query);
            println!("Status: {}", run.status.as_str());

            if let Some(provider) = &run.provider_used {
                println!("Provider: {}", provider);
            }
            if let Some(duration) = run.duration_ms {
                println!("Duration: {}ms", duration);
            }
            if let Some(error) = &run.error {
                println!("Error: {}", error);
            }

            println!();
            println!("Steps ({} total):", steps.len());
            println!();

            for step in &steps {
                match &step.sub_task {
                    Some(sub_task) => {
                        println!("Step {}: {} ({})", step.step_order, step.kind.as_str(), sub_task)
                    }
                    None => println!("Step {}: {}", step.step_order, step.kind.as_str()),
                }
                for line in step.content.lines() {
                    println!("  {}", line);
                }
                println!();
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "run": run,
                "steps": steps,
                "step_count": steps.len()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Parse a profile export: either a JSON array of records or one record.
pub fn parse_profiles(contents: &str) -> Result<Vec<ProfileRecord>> {
    let value: serde_json::Value =
        serde_json::from_str(contents).context("Profile file is not valid JSON")?;

    match value {
        serde_json::Value::Array(_) => {
            serde_json::from_value(value).context("Profile array has an invalid record")
        }
        other => Ok(vec![
            serde_json::from_value(other).context("Profile record is invalid")?
        ]),
    }
}

/// Load profile records into the profile store
pub async fn handle_profiles_import(file: &Path, config: &Config, format: OutputFormat) -> Result<()> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let records = parse_profiles(&contents)?;

    let database = Database::new(&config.db_path())
        .await
        .context("Failed to open database")?;
    let stored = database.profiles().import(&records).await?;
    let skipped = records.len() - stored;

    match format {
        OutputFormat::Text => {
            println!("Imported {} profile(s)", stored);
            if skipped > 0 {
                println!("Skipped {} record(s) without a profile URL", skipped);
            }
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "imported": stored,
                    "skipped": skipped,
                }))?
            );
        }
    }

    database.close().await?;
    Ok(())
}

/// Print one stored profile
pub async fn handle_profiles_show(url: &str, config: &Config, format: OutputFormat) -> Result<()> {
    let database = Database::new(&config.db_path())
        .await
        .context("Failed to open database")?;

    let record = database
        .profiles()
        .find_by_url(url)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No stored profile for {}", url))?;

    match format {
        OutputFormat::Text => {
            println!("{}", crate::capabilities::profile::profile_dump(&record));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}

/// Print a cached entity record
pub async fn handle_cache_show(uuid: &str, config: &Config, format: OutputFormat) -> Result<()> {
    let database = Database::new(&config.db_path())
        .await
        .context("Failed to open database")?;

    let record = database
        .entity_cache()
        .get(uuid)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No cached record for {}", uuid))?;

    match format {
        OutputFormat::Text => {
            println!("{} ({})", record.name, record.entity_type);
            println!("Fetched: {}", format_timestamp(record.fetched_at));
            println!();
            match EntityProfile::from_cached(&record.document) {
                Some(profile) => println!("{}", profile.render()),
                None => println!("{}", serde_json::to_string_pretty(&record.document)?),
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}

/// Store an API key read from stdin in the keychain
pub fn handle_secret_set(name: &str, format: OutputFormat) -> Result<()> {
    if !REQUIRED_KEYS.contains(&name) {
        anyhow::bail!(
            "Unknown key '{}'. Expected one of: {}",
            name,
            REQUIRED_KEYS.join(", ")
        );
    }

    if matches!(format, OutputFormat::Text) {
        eprint!("Value for {}: ", name);
    }
    let mut value = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut value)
        .context("Failed to read key from stdin")?;
    let value = value.trim();
    if value.is_empty() {
        anyhow::bail!("No value given for {}", name);
    }

    SecretManager::new(SECRET_SERVICE).set_secret(name, value)?;

    match format {
        OutputFormat::Text => println!("Stored {} in the system keychain.", name),
        OutputFormat::Json => println!("{}", json!({ "stored": name })),
    }
    Ok(())
}

/// Print the effective configuration
pub fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let text = toml::to_string_pretty(config).context("Failed to serialize config")?;
            print!("{}", text);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
    }
    Ok(())
}

/// Validate configuration, keys, storage and provider reachability
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let mut issues = Vec::new();
    let mut checks: Vec<(String, String)> = Vec::new();

    // Config is validated on load
    checks.push(("Configuration".into(), "Valid".into()));

    if config.core.data_dir.exists() {
        checks.push(("Data directory".into(), "Exists".into()));
    } else {
        checks.push(("Data directory".into(), "Missing".into()));
        issues.push(format!(
            "Data directory does not exist: {}",
            config.core.data_dir.display()
        ));
    }

    match Database::new(&config.db_path()).await {
        Ok(db) => {
            checks.push(("Database".into(), "OK".into()));
            db.close().await.ok();
        }
        Err(e) => {
            checks.push(("Database".into(), "Failed".into()));
            issues.push(format!("Cannot open database: {:#}", e));
        }
    }

    let secrets = default_secrets();
    for key in REQUIRED_KEYS {
        if secrets.is_available(key) {
            checks.push((key.to_string(), "Configured".into()));
        } else {
            checks.push((key.to_string(), "Not configured".into()));
            issues.push(format!(
                "{} is not set. Export {} or run 'delve secrets set {}'.",
                key,
                SecretManager::env_var_name(key),
                key
            ));
        }
    }

    let router = LLMRouter::new(
        completion_providers(config, &secrets),
        Arc::new(config.llm.clone()),
    );
    let health = router.check_health().await;
    for (name, healthy) in &health {
        checks.push((
            format!("LLM provider {}", name),
            if *healthy { "Available" } else { "Not available" }.into(),
        ));
    }
    if !health.iter().any(|(_, healthy)| *healthy) {
        issues.push("No LLM provider is reachable. Start Ollama or set an OpenAI key.".into());
    }

    match format {
        OutputFormat::Text => {
            println!("Delve Diagnostics");
            println!("=================");
            println!();

            println!("Checks:");
            for (check, status) in &checks {
                println!("  {:<28} {}", format!("{}:", check), status);
            }

            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({"name": name, "status": status})
                }).collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
