//! Metrics exposition HTTP server
//!
//! Serves the merged per-node registries in Prometheus text format. The
//! collector pulls; nothing is pushed.

use crate::registry::{self, MetricRegistry};
use crate::Result;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Clone)]
struct ServerState {
    registries: Arc<Vec<Arc<MetricRegistry>>>,
}

/// Build the exposition router over a fixed set of registries.
pub fn build_router(registries: Vec<Arc<MetricRegistry>>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/health", get(health_check))
        .with_state(ServerState {
            registries: Arc::new(registries),
        })
}

/// Bind and serve until the process exits.
pub async fn serve(addr: SocketAddr, registries: Vec<Arc<MetricRegistry>>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("metrics exposed on http://{}/metrics", addr);
    axum::serve(listener, build_router(registries))
        .await
        .map_err(crate::Error::Io)?;
    Ok(())
}

async fn metrics(State(state): State<ServerState>) -> impl IntoResponse {
    let body = registry::render_metrics(&state.registries);
    ([(header::CONTENT_TYPE, TEXT_FORMAT)], body)
}

async fn health_check() -> &'static str {
    "OK"
}
