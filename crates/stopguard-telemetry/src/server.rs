//! Metrics HTTP endpoint using axum.

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::TelemetryResult;
use crate::metrics::Metrics;

/// Create the metrics router (`/metrics`, `/health`).
pub fn create_router() -> Router {
    Router::new()
        .route("/metrics", get(serve_metrics))
        .route("/health", get(|| async { "ok" }))
}

async fn serve_metrics() -> impl IntoResponse {
    match Metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Serve metrics on `port` until `shutdown` is cancelled.
pub async fn run_metrics_server(port: u16, shutdown: CancellationToken) -> TelemetryResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Starting metrics server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, create_router())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("Metrics server stopped");
    Ok(())
}
