#![forbid(unsafe_code)]

//! `lineup`: attendance poll and queue bot.
//!
//! Bootstraps configuration and storage, connects Slack Socket Mode, and
//! runs the finalize task runner, the overdue-poll reconciler, retention,
//! and the health endpoint until a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use lineup::config::GlobalConfig;
use lineup::display::DisplayZone;
use lineup::health;
use lineup::intent::literal::LiteralResolver;
use lineup::intent::openai::OpenAiResolver;
use lineup::intent::{FallbackResolver, IntentResolver};
use lineup::persistence::{db, retention};
use lineup::slack::client::SlackService;
use lineup::state::AppState;
use lineup::transport::ChatTransport;
use lineup::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "lineup", about = "Attendance poll and queue bot", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("lineup bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    config.load_credentials().await?;
    let config = Arc::new(config);
    info!("configuration loaded");

    // ── Initialize database ─────────────────────────────
    let db = Arc::new(db::connect(&config.db_path).await?);
    info!(path = %config.db_path.display(), "database connected");

    // ── Collaborators ───────────────────────────────────
    let slack = Arc::new(SlackService::new(&config.slack).inspect_err(|err| {
        error!(%err, "slack client init failed");
    })?);
    let resolver = build_resolver(&config)?;

    let state = Arc::new(AppState::new(
        Arc::clone(&config),
        Arc::clone(&db),
        Arc::clone(&slack) as Arc<dyn ChatTransport>,
        resolver,
    )?);
    let ct = state.shutdown.clone();

    // ── Background services ─────────────────────────────
    let runner_handle = Arc::new(state.task_runner()).spawn(ct.clone(), config.shutdown_grace());
    let reconcile_handle = state.reconciler().spawn(
        Duration::from_secs(config.scheduler.reconcile_interval_seconds),
        ct.clone(),
    );
    let retention_handle =
        retention::spawn_retention_task(Arc::clone(&db), config.retention_days, ct.clone());

    let health_ct = ct.clone();
    let http_port = config.http_port;
    let health_handle = tokio::spawn(async move {
        if let Err(err) = health::serve_health(http_port, health_ct).await {
            error!(%err, "health endpoint failed");
        }
    });

    let socket_handle = slack.spawn_socket_mode(Arc::clone(&state), ct.clone());
    info!("lineup ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    // ── Drain in-flight handler work ────────────────────
    state.in_flight.close();
    if tokio::time::timeout(config.shutdown_grace(), state.in_flight.wait())
        .await
        .is_err()
    {
        warn!(
            remaining = state.in_flight.len(),
            "grace period elapsed with handlers still running"
        );
    }

    let _ = tokio::join!(
        socket_handle,
        runner_handle,
        reconcile_handle,
        retention_handle,
        health_handle
    );
    db.close().await;
    info!("lineup shut down");

    Ok(())
}

/// LLM resolver in front of the literal parser when enabled, the literal
/// parser alone otherwise.
fn build_resolver(config: &GlobalConfig) -> Result<Arc<dyn IntentResolver>> {
    let literal: Arc<dyn IntentResolver> = Arc::new(LiteralResolver);
    let primary: Option<Arc<dyn IntentResolver>> = if config.intent.enabled {
        let zone = DisplayZone::from_config(&config.display)?;
        info!(model = %config.intent.model, "llm intent resolver enabled");
        Some(Arc::new(OpenAiResolver::new(&config.intent, zone)?))
    } else {
        info!("llm intent resolver disabled; using literal parsing");
        None
    };
    Ok(Arc::new(FallbackResolver::new(primary, literal)))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
