// Delve research agent
// Main entry point for the delve binary

use clap::Parser;
use delve_engine::cli::{CacheAction, Cli, Command, ConfigAction, ProfileAction, SecretAction};
use delve_engine::config::Config;
use delve_engine::handlers::{
    handle_ask, handle_batch, handle_cache_show, handle_config_show, handle_doctor,
    handle_history, handle_profiles_import, handle_profiles_show, handle_replay,
    handle_secret_set, OutputFormat,
};
use delve_engine::telemetry::init_telemetry_with_level;
use sdk::{DelveErrorExt, EngineError};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(engine_err) = e.downcast_ref::<EngineError>() {
                eprintln!("Hint: {}", engine_err.user_hint());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // RUST_LOG still wins over both
    let level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(level);

    tracing::debug!(
        "Delve v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Command::Ask { query } => {
            tracing::info!("Researching: {}", query);
            handle_ask(query, &config, format).await
        }

        Command::Batch {
            csv,
            template,
            column,
        } => {
            tracing::info!("Batch run over {}", csv.display());
            handle_batch(&csv, &template, column.as_deref(), &config, format).await
        }

        Command::History { limit } => handle_history(limit, &config, format).await,

        Command::Replay { run_id } => handle_replay(run_id, &config, format).await,

        Command::Profiles { action } => match action {
            ProfileAction::Import { file } => handle_profiles_import(&file, &config, format).await,
            ProfileAction::Show { url } => handle_profiles_show(&url, &config, format).await,
        },

        Command::Cache { action } => match action {
            CacheAction::Show { uuid } => handle_cache_show(&uuid, &config, format).await,
        },

        Command::Secrets { action } => match action {
            SecretAction::Set { name } => handle_secret_set(&name, format),
        },

        Command::Config { action } => match action {
            ConfigAction::Show => handle_config_show(&config, format),
        },

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, format).await
        }
    }
}
