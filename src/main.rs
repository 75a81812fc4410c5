//! # Interview Backend - Main Application Entry Point
//!
//! Realtime interview session server: each client holds one WebSocket
//! connection carrying interleaved control JSON and raw PCM16 audio, and
//! gets back live transcription, generated interviewer questions with
//! synthesized speech, and persisted session artifacts.
//!
//! ## Module map:
//! - **config**: layered configuration (defaults, config.toml, environment)
//! - **protocol**: the client/server frame definitions
//! - **websocket**: the per-connection actor and message dispatch
//! - **audio / pipeline / transcript**: windowed streaming transcription
//! - **session**: interview state, turn progression, the session registry
//! - **providers**: injected external collaborators (STT, TTS, LLM, parsing)
//! - **artifacts / storage**: local persistence and best-effort upload
//! - **server**: embedded start/stop around the actix HttpServer

mod artifacts;
mod audio;
mod config;
mod error;
mod health;
mod middleware;
mod pipeline;
mod protocol;
mod providers;
mod server;
mod session;
mod state;
mod storage;
mod transcript;
mod websocket;

use anyhow::{Context, Result};
use config::AppConfig;
use providers::Collaborators;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storage::{FsObjectStorage, ObjectStorage};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Global shutdown flag flipped by the signal handler task.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// How long in-flight connections get to drain on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting interview-backend v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded: {}:{}",
        config.server.host, config.server.port
    );

    let artifacts = artifacts::ArtifactStore::new(&config.artifacts.root_dir);
    artifacts
        .ensure_layout()
        .context("failed to create artifact directories")?;

    let storage: Option<Arc<dyn ObjectStorage>> = config
        .storage
        .root
        .as_ref()
        .map(|root| Arc::new(FsObjectStorage::new(root)) as Arc<dyn ObjectStorage>);
    if storage.is_none() {
        info!("No storage root configured, artifact uploads disabled");
    }

    // Collaborators are wired here; without external services configured the
    // server runs in degraded mode (empty transcriptions, error frames for
    // question generation).
    let collaborators = Collaborators::disabled();

    let state = AppState::new(config.clone(), collaborators, storage, artifacts);
    let mut server = server::InterviewServer::new(state);

    setup_signal_handlers();

    server
        .start(&config.server.host, Some(config.server.port))
        .await?;

    wait_for_shutdown().await;
    info!("Shutdown signal received, stopping server...");

    if let Err(err) = server.stop(SHUTDOWN_GRACE).await {
        error!(error = %err, "Forced shutdown");
        return Err(err.into());
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Structured logging to the console, filterable via `RUST_LOG`.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "interview_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Flip the shutdown flag on SIGTERM or SIGINT.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate());
        let sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt());

        match (sigterm, sigint) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = sigint.recv() => info!("Received SIGINT"),
                }
            }
            _ => {
                error!("Failed to install signal handlers, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
