//! Request counter contract, observed through the Prometheus endpoint.
//!
//! The recorder is process-wide, so everything lives in a single test.

use axum::http::StatusCode;
use tokio::net::TcpListener;

use metadata_proxy::observability::metrics::{self, ProxyType};
use metadata_proxy::Shutdown;

mod common;

use common::{client, dead_upstream_url, request_count, start_proxy, start_stub_upstream};

#[tokio::test]
async fn every_request_is_counted_once_by_outcome() {
    let handle = metrics::install_recorder().unwrap();

    let metrics_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let metrics_addr = metrics_listener.local_addr().unwrap();
    let metrics_shutdown = Shutdown::new();
    tokio::spawn(metrics::serve(
        metrics_listener,
        handle.clone(),
        metrics_shutdown.subscribe(),
    ));

    let upstream = start_stub_upstream().await;
    let proxy = start_proxy(&upstream.url()).await;
    let dead = start_proxy(&dead_upstream_url()).await;
    let client = client();

    for path in [
        "/computeMetadata/v1/instance/attributes/kube-env",
        "/random/unknown/path",
    ] {
        let res = client.get(proxy.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    let res = client
        .get(proxy.url("/computeMetadata/v1/instance/hostname"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(proxy.url("/computeMetadata/v1/instance/attributes/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(dead.url("/computeMetadata/v1/instance/hostname"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    let scrape = client
        .get(format!("http://{}/metrics", metrics_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(scrape.status(), StatusCode::OK);
    let rendered = scrape.text().await.unwrap();

    assert_eq!(request_count(&rendered, ProxyType::Blocked, StatusCode::FORBIDDEN), 2);
    assert_eq!(request_count(&rendered, ProxyType::Proxied, StatusCode::OK), 1);
    assert_eq!(request_count(&rendered, ProxyType::Proxied, StatusCode::NOT_FOUND), 1);
    assert_eq!(request_count(&rendered, ProxyType::Proxied, StatusCode::BAD_GATEWAY), 1);
    assert_eq!(request_count(&rendered, ProxyType::Proxied, StatusCode::FORBIDDEN), 0);
    assert!(rendered.contains("# HELP metadata_proxy_request_count"));

    metrics_shutdown.trigger();
}
