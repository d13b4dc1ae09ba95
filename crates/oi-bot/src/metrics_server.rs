//! Prometheus text endpoint.

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use oi_telemetry::Metrics;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

async fn metrics_handler() -> (StatusCode, String) {
    match Metrics::encode_text() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub fn create_router() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serve `/metrics` until `shutdown` flips to true.
pub async fn serve_metrics(port: u16, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(port, "Serving metrics");

    axum::serve(listener, create_router())
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
}
