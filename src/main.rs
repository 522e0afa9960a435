use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use lmchat::chat::{self, ChatService};
use lmchat::cli::{Cli, Command};
use lmchat::config::Settings;
use lmchat::llm::provider::HuggingFaceProvider;
use lmchat::llm::{catalog, ModelManager};
use lmchat::server::{ApiServer, AppState};
use lmchat::smoke;
use lmchat::storage::ConversationStore;

/// Main entry point for the lmchat application.
///
/// Modes of operation:
/// - Run: starts the API server and an interactive chat session
/// - Serve: starts only the API server
/// - Chat: connects a chat session to an already running server
/// - Models: prints the curated model catalog
/// - SmokeTest: probes one model and emits a JSON report
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Catalog printing needs no settings or logging.
    if matches!(cli.command, Some(Command::Models)) {
        catalog::display_catalog();
        return Ok(());
    }

    // Load settings first
    let settings = Settings::new().map_err(|e| anyhow!("configuration error: {}", e))?;

    // Initialize the subscriber before any file operations
    let file_appender = tracing_appender::rolling::RollingFileAppender::new(
        tracing_appender::rolling::Rotation::DAILY,
        settings
            .logging
            .file
            .as_deref()
            .unwrap_or_else(|| Path::new("logs")),
        "lmchat",
    );

    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        // Disable ANSI colors for cleaner log files
        .with_ansi(false)
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .with_max_level(parse_level(&settings.logging.level))
        .init();

    info!("lmchat starting up");

    match cli.command {
        None | Some(Command::Run) => {
            let server = build_server(&settings).await?;
            tokio::spawn(async move {
                if let Err(e) = server.start().await {
                    eprintln!("Server error: {}", e);
                }
            });

            // Give the server a moment to bind before the REPL health check.
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

            chat::chat_loop(&settings)
                .await
                .map_err(|e| anyhow!("chat session failed: {}", e))?;
        }
        Some(Command::Serve) => {
            let server = build_server(&settings).await?;
            server
                .start()
                .await
                .map_err(|e| anyhow!("server failed: {}", e))?;
        }
        Some(Command::Chat) => {
            chat::chat_loop(&settings)
                .await
                .map_err(|e| anyhow!("chat session failed: {}", e))?;
        }
        Some(Command::SmokeTest { model }) => {
            let ok = smoke::run(&settings, &model).await?;
            if !ok {
                std::process::exit(1);
            }
        }
        Some(Command::Models) => unreachable!("handled above"),
    }

    Ok(())
}

/// Wires provider, manager, store, and chat service into a ready server,
/// loading the configured default model up front. A failed startup load is
/// reported but not fatal; the health endpoint keeps saying so until a later
/// load succeeds.
async fn build_server(settings: &Settings) -> Result<ApiServer> {
    let provider = Arc::new(HuggingFaceProvider::new(
        settings.models.directory.clone(),
        settings.generation.context_size,
    ));
    let manager = Arc::new(ModelManager::new(provider, settings.models.quantized));

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40}] {pos}% {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_prefix("download");
    let observer = smoke::download_observer(bar.clone());

    println!("Loading model: {}", settings.models.default_model);
    match manager
        .load_model(&settings.models.default_model, Some(observer))
        .await
    {
        Ok(report) => {
            bar.finish_and_clear();
            println!("Model ready: {}", report.model);
        }
        Err(e) => {
            bar.abandon();
            warn!("Startup model load failed: {}", e);
            println!("Model load failed: {} (serving anyway)", e);
        }
    }

    let store = ConversationStore::new(settings.storage.data_dir.clone())
        .map_err(|e| anyhow!("failed to open conversation store: {}", e))?;
    let chat_service = ChatService::new(store, Arc::clone(&manager), settings.generation.clone());

    Ok(ApiServer::new(
        AppState {
            chat: chat_service,
            manager,
        },
        settings.server.host.clone(),
        settings.server.port,
    ))
}

fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    }
}
