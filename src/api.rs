//! HTTP server for health and metrics endpoints
//!
//! - GET /health  - relay status (JSON)
//! - GET /healthz - liveness
//! - GET /readyz  - ready once the source chain has been polled
//! - GET /metrics - Prometheus metrics

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use eyre::WrapErr;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::info;

use crate::metrics;
use crate::types::SubmissionMode;

/// Static facts about this relayer, shared with handlers
#[derive(Debug)]
pub struct ApiInfo {
    pub started_at: Instant,
    pub mode: SubmissionMode,
    pub destination_chain_id: u64,
}

pub type AppState = Arc<ApiInfo>;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub mode: &'static str,
    pub destination_chain_id: u64,
    pub uptime_seconds: u64,
    pub source_height: i64,
    pub deferred_events: i64,
    pub replay_entries: i64,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if metrics::UP.get() > 0.0 { "healthy" } else { "stopped" };
    Json(HealthResponse {
        status,
        mode: state.mode.as_str(),
        destination_chain_id: state.destination_chain_id,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        source_height: metrics::SOURCE_HEIGHT.get(),
        deferred_events: metrics::DEFERRED_EVENTS.get(),
        replay_entries: metrics::REPLAY_STORE_SIZE.get(),
    })
}

/// Liveness probe (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Readiness probe: at least one successful source poll
async fn readiness() -> Response {
    if metrics::LAST_SUCCESSFUL_POLL.get() > 0.0 {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT_READY").into_response()
    }
}

async fn prometheus_metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response();
    }

    ([(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer).into_response()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

/// Serve the health and metrics endpoints until the process exits
pub async fn start_api_server(addr: SocketAddr, state: AppState) -> eyre::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("Failed to bind API server to {}", addr))?;
    info!(%addr, "API server started");

    axum::serve(listener, router(state))
        .await
        .wrap_err("API server failed")?;
    Ok(())
}
