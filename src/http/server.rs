//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler as the catch-all
//! - Wire up middleware (per-request trace span)
//! - Classify every request before anything is sent upstream
//! - Forward allowed requests, answer blocked ones locally
//! - Record exactly one metric per request once its status is final

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::filter::{Classifier, Decision, RuleSet};
use crate::http::forward::Forwarder;
use crate::http::response;
use crate::observability::metrics::{self, ProxyType};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Classifier,
    pub forwarder: Forwarder,
}

/// HTTP server for the metadata proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Compile the rules and build the upstream client.
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        let rules = Arc::new(RuleSet::from_config(&config.rules)?);
        let state = AppState {
            classifier: Classifier::new(rules),
            forwarder: Forwarder::new(&config.upstream)?,
        };

        let router = Self::build_router(state);
        Ok(Self { router, config })
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    request_id = %Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }))
    }

    /// The request router, for serving on a custom transport.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Serve on the given listener until shutdown is signalled.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.url,
            "Metadata proxy listening"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: classify, then answer locally or relay.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let decision = state.classifier.classify(request.uri(), request.headers());

    let (response, proxy_type) = match decision {
        Decision::Blocked { reason, status } => {
            tracing::info!(
                peer = ?peer,
                path = %request.uri().path(),
                reason = reason.as_str(),
                status = status.as_u16(),
                "Request blocked"
            );
            (response::blocked(reason, status), ProxyType::Blocked)
        }
        Decision::Allowed => {
            tracing::debug!(peer = ?peer, "Proxying request");
            let response = match state.forwarder.forward(request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(
                        upstream = %state.forwarder.authority(),
                        error = %e,
                        "Upstream request failed"
                    );
                    response::upstream_failure(&e)
                }
            };
            (response, ProxyType::Proxied)
        }
    };

    metrics::record_request(proxy_type, response.status());
    response
}
