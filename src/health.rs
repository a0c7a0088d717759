//! HTTP liveness endpoint.

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{AppError, Result};

/// Router exposing `GET /healthz`.
pub fn router() -> Router {
    Router::new().route("/healthz", get(|| async { "ok" }))
}

/// Bind `0.0.0.0:port` and serve until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Io` if the port cannot be bound or serving fails.
pub async fn serve_health(port: u16, ct: CancellationToken) -> Result<()> {
    let bind = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&bind)
        .await
        .map_err(|err| AppError::Io(format!("failed to bind health endpoint on {bind}: {err}")))?;
    serve_on(listener, ct).await
}

/// Serve on an already bound listener until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Io` if serving fails.
pub async fn serve_on(listener: TcpListener, ct: CancellationToken) -> Result<()> {
    let addr = listener
        .local_addr()
        .map_err(|err| AppError::Io(format!("health listener address: {err}")))?;
    info!(%addr, "health endpoint listening");

    axum::serve(listener, router())
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("health server error: {err}")))?;

    info!("health endpoint shut down");
    Ok(())
}
