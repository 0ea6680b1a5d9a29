// ABOUTME: HTTP transport for the MCP endpoint, plus health and Prometheus metrics routes
// ABOUTME: Serves until ctrl-c, then stops the bot before returning

use crate::mcp::{mcp_handler, McpState};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bcbot_core::config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the router: MCP endpoint at the configured path, /health and /metrics
pub fn router(state: Arc<McpState>, path: &str, metrics_handle: Option<PrometheusHandle>) -> Router {
    let mut app = Router::new()
        .route(path, post(mcp_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    if let Some(handle) = metrics_handle {
        let metrics_router = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(handle);
        app = app.merge(metrics_router);
    }

    app.layer(TraceLayer::new_for_http())
}

async fn health_handler(State(state): State<Arc<McpState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "bot": state.controller.status(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (StatusCode::OK, handle.render())
}

/// Serve MCP over HTTP until ctrl-c
pub async fn serve_http(
    config: &Config,
    state: Arc<McpState>,
    metrics_handle: Option<PrometheusHandle>,
) -> Result<()> {
    let app = router(Arc::clone(&state), &config.server.path, metrics_handle);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind MCP server to {}", addr))?;

    tracing::info!(
        addr = %addr,
        path = %config.server.path,
        "MCP server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("MCP server error")?;

    tracing::info!("MCP server shutting down");
    state.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
