//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count every completed request by outcome and final status
//! - Expose a Prometheus-compatible endpoint on its own listener
//!
//! # Metrics
//! - `metadata_proxy_request_count` (counter): requests by `proxy_type`
//!   (`proxy_type_blocked` / `proxy_type_proxied`) and HTTP `code`
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder it is a no-op
//! - The handler records exactly once per request, after the status is final

use std::io;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::error::ProxyError;

pub const REQUEST_COUNTER: &str = "metadata_proxy_request_count";

/// How a request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyType {
    Blocked,
    Proxied,
}

impl ProxyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyType::Blocked => "proxy_type_blocked",
            ProxyType::Proxied => "proxy_type_proxied",
        }
    }
}

/// Record one completed request.
pub fn record_request(proxy_type: ProxyType, status: StatusCode) {
    ::metrics::counter!(
        REQUEST_COUNTER,
        "proxy_type" => proxy_type.as_str(),
        "code" => status.as_u16().to_string()
    )
    .increment(1);
}

fn describe() {
    ::metrics::describe_counter!(
        REQUEST_COUNTER,
        "Counter of metadata proxy requests broken out by each type of request and HTTP response code."
    );
}

/// Install the process-wide Prometheus recorder.
pub fn install_recorder() -> Result<PrometheusHandle, ProxyError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ProxyError::Metrics(e.to_string()))?;
    describe();
    Ok(handle)
}

/// Router serving the rendered metrics at `/metrics`.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(render))
        .with_state(handle)
}

async fn render(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

/// Serve the metrics endpoint until shutdown.
pub async fn serve(
    listener: TcpListener,
    handle: PrometheusHandle,
    mut shutdown: broadcast::Receiver<()>,
) -> io::Result<()> {
    tracing::info!(address = %listener.local_addr()?, "Metrics endpoint listening");

    axum::serve(listener, metrics_router(handle))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
