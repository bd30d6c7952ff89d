//! invoice-intake - invoice upload batch service
//!
//! Serves the upload surface of the invoice dashboard: files are screened,
//! advanced through a simulated extraction pipeline one at a time, paused for
//! review when they look like an invoice already on file, and summarised once
//! the batch settles. Progress is streamed over SSE.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invoice_common::events::EventBus;
use invoice_intake::config::IntakeConfig;
use invoice_intake::AppState;

#[derive(Parser, Debug)]
#[command(name = "invoice-intake")]
#[command(about = "Invoice upload batch service")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "INVOICE_INTAKE_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port; overrides the config file
    #[arg(short, long, env = "INVOICE_INTAKE_PORT")]
    port: Option<u16>,

    /// Bind address; overrides the config file
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = IntakeConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(args.port, args.bind);
    config.validate().context("Invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_directive().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting invoice-intake");
    info!(
        "Version: {} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );
    info!(
        upload_ms = config.pipeline.upload_delay_ms,
        extract_ms = config.pipeline.extract_delay_ms,
        analyze_ms = config.pipeline.analyze_delay_ms,
        settle_ms = config.pipeline.settle_delay_ms,
        "Pipeline timing"
    );

    let addr = config.socket_addr().context("Invalid listen address")?;

    let event_bus = EventBus::new(config.event_capacity);
    info!("Event bus initialized (capacity {})", event_bus.capacity());

    let state = AppState::new(config, event_bus);
    let app = invoice_intake::build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(batch_id) = state.close_surface().await {
        info!(batch_id = %batch_id, "Closed open upload batch on shutdown");
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
