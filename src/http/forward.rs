//! Relaying allowed requests to the metadata server.
//!
//! # Responsibilities
//! - Retarget the request at the fixed upstream, keeping method, path,
//!   query, end-to-end headers and body
//! - Run the outbound transforms right before the client call
//! - Relay the upstream status, headers and body back unchanged
//!
//! # Design Decisions
//! - One pooled client, no retries: a transport failure is the caller's answer
//! - The upstream future lives inside the request task; if the caller goes
//!   away the task is dropped and the upstream call is aborted with it
//! - The inbound `Host` header is kept as sent

use std::str::FromStr;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, HeaderMap, HeaderName, Request, Response, StatusCode, Uri, Version};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::config::validation::check_upstream_url;
use crate::config::UpstreamConfig;
use crate::error::ProxyError;
use crate::filter::X_FORWARDED_FOR;

/// Connection-scoped headers that must not cross the proxy.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// A step applied to every outbound request just before it is sent.
pub type RequestTransform = fn(&mut Request<Body>);

/// Outbound transforms, in application order.
pub const OUTBOUND_TRANSFORMS: &[RequestTransform] =
    &[strip_forwarded_for, strip_hop_by_hop, force_http11];

/// Per-request forwarding failure.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("Failed to build upstream request: {0}")]
    InvalidUri(#[from] axum::http::Error),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

impl ForwardError {
    /// Status returned to the caller for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::InvalidUri(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ForwardError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Stateless relay to a single upstream.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    scheme: Scheme,
    authority: Authority,
}

impl Forwarder {
    /// Build a forwarder for the configured upstream.
    pub fn new(config: &UpstreamConfig) -> Result<Self, ProxyError> {
        let url = check_upstream_url(&config.url).map_err(ProxyError::InvalidUpstream)?;
        let host = url
            .host_str()
            .ok_or_else(|| ProxyError::InvalidUpstream(format!("'{}' has no host", config.url)))?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let authority = Authority::from_str(&authority)
            .map_err(|e| ProxyError::InvalidUpstream(format!("{}: {}", authority, e)))?;

        let mut connector = HttpConnector::new();
        if config.connect_timeout_secs > 0 {
            connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        }
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            scheme: Scheme::HTTP,
            authority,
        })
    }

    /// The `host[:port]` requests are sent to.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Send an allowed request upstream and hand back its response.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError> {
        let request = self.prepare(request)?;
        let response = self.client.request(request).await?;

        let (mut parts, body) = response.into_parts();
        remove_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }

    /// Retarget the request and apply [`OUTBOUND_TRANSFORMS`].
    pub fn prepare(&self, request: Request<Body>) -> Result<Request<Body>, ForwardError> {
        let (mut parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        parts.uri = Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()?;

        let mut request = Request::from_parts(parts, body);
        for transform in OUTBOUND_TRANSFORMS {
            transform(&mut request);
        }
        Ok(request)
    }
}

/// The metadata server rejects requests carrying `X-Forwarded-For`.
pub fn strip_forwarded_for(request: &mut Request<Body>) {
    request.headers_mut().remove(X_FORWARDED_FOR);
}

pub fn strip_hop_by_hop(request: &mut Request<Body>) {
    remove_hop_by_hop(request.headers_mut());
}

/// The upstream connection is plain HTTP/1.1 whatever the caller spoke.
pub fn force_http11(request: &mut Request<Body>) {
    *request.version_mut() = Version::HTTP_11;
}

/// Drop hop-by-hop headers, including any listed in `Connection`.
pub fn remove_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}
