//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, Request, Response, StatusCode},
    Router,
};
use tokio::net::TcpListener;

use metadata_proxy::observability::metrics::{ProxyType, REQUEST_COUNTER};
use metadata_proxy::{HttpServer, ProxyConfig, Shutdown};

#[allow(dead_code)]
pub const HOSTNAME: &str = "test-instance.c.test-project.internal";

/// A request as the stub upstream received it.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone, Default)]
struct StubState {
    hits: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    slow_started: Arc<AtomicBool>,
    slow_dropped: Arc<AtomicBool>,
}

/// Sets its flag when the handler holding it goes away.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Stand-in for the metadata server.
///
/// - `GET .../missing` → 404
/// - `GET .../slow` → answers after a minute, unless dropped first
/// - other `GET` → 200 with [`HOSTNAME`] and `Metadata-Flavor: Google`
/// - any other method → 201 echoing the request body
pub struct StubUpstream {
    pub addr: SocketAddr,
    state: StubState,
}

#[allow(dead_code)]
impl StubUpstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.state.seen.lock().unwrap().clone()
    }

    /// A `.../slow` request has reached the handler.
    pub fn slow_started(&self) -> bool {
        self.state.slow_started.load(Ordering::SeqCst)
    }

    /// A `.../slow` handler was dropped (or finished).
    pub fn slow_dropped(&self) -> bool {
        self.state.slow_dropped.load(Ordering::SeqCst)
    }
}

pub async fn start_stub_upstream() -> StubUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = StubState::default();

    let app = Router::new().fallback(stub_handler).with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    StubUpstream { addr, state }
}

async fn stub_handler(State(state): State<StubState>, request: Request<Body>) -> Response<Body> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, 1024 * 1024).await.unwrap_or_default();

    state.hits.fetch_add(1, Ordering::SeqCst);
    state.seen.lock().unwrap().push(SeenRequest {
        method: parts.method.clone(),
        uri: parts.uri.to_string(),
        headers: parts.headers.clone(),
        body: body.clone(),
    });

    if parts.uri.path().ends_with("/slow") {
        let _guard = DropFlag(state.slow_dropped.clone());
        state.slow_started.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
    }

    let builder = Response::builder().header("metadata-flavor", "Google");
    let response = if parts.method != Method::GET {
        builder.status(StatusCode::CREATED).body(Body::from(body))
    } else if parts.uri.path().ends_with("/missing") {
        builder.status(StatusCode::NOT_FOUND).body(Body::from("not found"))
    } else {
        builder
            .status(StatusCode::OK)
            .header("content-type", "application/text")
            .body(Body::from(HOSTNAME))
    };
    response.unwrap()
}

/// A running proxy on an ephemeral port; stops when dropped.
pub struct TestProxy {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

#[allow(dead_code)]
impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_proxy(upstream_url: &str) -> TestProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = ProxyConfig::default();
    config.listener.bind_address = addr.to_string();
    config.upstream.url = upstream_url.to_string();
    config.observability.metrics_enabled = false;

    let server = HttpServer::new(config).unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestProxy { addr, shutdown }
}

/// An upstream URL nothing is listening on.
#[allow(dead_code)]
pub fn dead_upstream_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Poll `condition` until it holds or five seconds pass.
#[allow(dead_code)]
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..250 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// Read the request counter for one label pair out of a `/metrics` scrape.
/// Returns 0 when the series has not been recorded.
#[allow(dead_code)]
pub fn request_count(rendered: &str, proxy_type: ProxyType, status: StatusCode) -> u64 {
    let proxy_label = format!("proxy_type=\"{}\"", proxy_type.as_str());
    let code_label = format!("code=\"{}\"", status.as_u16());

    rendered
        .lines()
        .filter(|line| line.starts_with(REQUEST_COUNTER))
        .filter(|line| line.contains(&proxy_label) && line.contains(&code_label))
        .filter_map(|line| line.rsplit(' ').next())
        .filter_map(|value| value.parse::<f64>().ok())
        .map(|value| value as u64)
        .sum()
}
