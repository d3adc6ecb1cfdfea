//! HTTP surface of the gateway
//!
//! - `POST /ingest`: push invocation (trigger batch in, routing summary out)
//! - `GET /metrics`: Prometheus text format
//! - `GET /health`: sink health by channel
//!
//! # Example
//!
//! ```ignore
//! use telemetry_gateway::server;
//!
//! server::serve(config.http_addr, Arc::clone(&hub), shutdown_signal()).await?;
//! ```

use crate::error::Result;
use crate::hub::HubRunner;
use crate::record::TriggerBatch;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Build the router over a hub
pub fn router(hub: Arc<HubRunner>) -> Router {
    Router::new()
        .route("/ingest", post(ingest_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(hub)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(addr: SocketAddr, hub: Arc<HubRunner>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP server listening");
    axum::serve(listener, router(hub))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Handler for /ingest
///
/// `204` for an empty batch, `202` once every channel is written, `502` if
/// any channel write failed. The summary is returned either way.
async fn ingest_handler(
    State(hub): State<Arc<HubRunner>>,
    Json(batch): Json<TriggerBatch>,
) -> Response {
    match hub.handle_batch(batch).await {
        None => StatusCode::NO_CONTENT.into_response(),
        Some(summary) if summary.routing.is_success() => {
            (StatusCode::ACCEPTED, Json(summary)).into_response()
        }
        Some(summary) => (StatusCode::BAD_GATEWAY, Json(summary)).into_response(),
    }
}

/// Handler for /metrics
async fn metrics_handler() -> impl IntoResponse {
    let body = crate::metrics::gather();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Handler for /health
async fn health_handler(State(hub): State<Arc<HubRunner>>) -> impl IntoResponse {
    let channels = hub.router().health().await;
    let healthy = channels.values().all(|ok| *ok);
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if healthy { "ok" } else { "degraded" },
            "channels": channels,
            "pollers": hub.polled_vendors(),
        })),
    )
}
