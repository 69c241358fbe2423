//! Jimaku - video download and subtitle generation service
//!
//! HTTP backend that orchestrates yt-dlp, a whisper CLI, translation services
//! and ffmpeg behind a REST/WebSocket API with background task tracking.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use jimaku::api::{self, AppState};
use jimaku::cli::{Args, Commands};
use jimaku::config::Config;
use jimaku::task::NullProgress;
use jimaku::transcribe::ModelCatalog;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new("config.toml").exists() {
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    setup_logging(args.verbose, &config)?;

    match args.command {
        Commands::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await?;
        }
        Commands::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "{} already exists, use --force to overwrite",
                    output.display()
                );
            }
            Config::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
        Commands::Models { download } => {
            let catalog = ModelCatalog::new(&config.storage.models_dir);
            println!(
                "{:<12} {:<22} {:>10}  {:<10}",
                "Name", "Filename", "Size (MB)", "Status"
            );
            println!("{}", "-".repeat(60));
            for model in catalog.list() {
                let status = if model.downloaded { "Downloaded" } else { "Missing" };
                println!(
                    "{:<12} {:<22} {:>10.0}  {:<10}",
                    model.name, model.filename, model.size_mb, status
                );
            }

            if download {
                config.ensure_directories()?;
                for model in catalog.list() {
                    if !model.downloaded {
                        catalog.download(model.name, &NullProgress).await?;
                    }
                }
                println!("All models downloaded");
            }
        }
    }

    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    config.ensure_directories()?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let cleanup_interval = Duration::from_secs(config.tasks.cleanup_interval_secs);

    let state = AppState::new(config)?;
    state
        .tasks
        .clone()
        .spawn_sweeper(cleanup_interval, state.config.storage.temp_dir.clone());

    if let Err(e) = state.ytdlp.check_availability().await {
        tracing::warn!("yt-dlp check failed, downloads will not work: {}", e);
    }
    match state.media.check_availability().await {
        Ok(version) => info!("ffmpeg available: {}", version),
        Err(e) => tracing::warn!("ffmpeg check failed, media processing will not work: {}", e),
    }

    let router = api::create_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

/// Log to console and a daily-rolling file
fn setup_logging(verbose: bool, config: &Config) -> Result<()> {
    let log_dir = &config.storage.log_dir;
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, "jimaku.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer().with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("jimaku.log").display()
    );

    Ok(())
}
