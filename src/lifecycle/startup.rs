//! Startup orchestration.
//!
//! # Responsibilities
//! - Install the metrics recorder and bind its listener
//! - Compile rules and build the upstream client
//! - Bind the proxy listener and begin accepting traffic
//! - Supervise both servers until shutdown
//!
//! # Design Decisions
//! - Expects a validated config; `main` validates once, after CLI overrides
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)
//! - The metrics server failing at runtime stops the proxy too

use std::future::Future;
use std::io;

use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinHandle};

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::shutdown_signal;
use crate::observability::metrics;

/// Run the proxy until a shutdown signal arrives.
pub async fn run(config: ProxyConfig) -> Result<()> {
    let shutdown = Shutdown::new();

    let metrics_task = if config.observability.metrics_enabled {
        let handle = metrics::install_recorder()?;
        let listener = bind(&config.observability.metrics_address).await?;
        Some(tokio::spawn(metrics::serve(listener, handle, shutdown.subscribe())))
    } else {
        tracing::info!("Metrics endpoint disabled");
        None
    };

    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config)?;
    let listener = bind(&bind_address).await?;

    let signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal.trigger();
    });

    let serve = server.run(listener, shutdown.subscribe());
    match metrics_task {
        Some(task) => supervise(serve, task, &shutdown).await,
        None => Ok(serve.await?),
    }
}

/// Wait for the proxy and the metrics server; whichever stops first takes
/// the other down with it. A metrics failure is reported as the result.
async fn supervise<F>(
    serve: F,
    mut metrics_task: JoinHandle<io::Result<()>>,
    shutdown: &Shutdown,
) -> Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    tokio::pin!(serve);

    tokio::select! {
        result = &mut serve => {
            result?;
            shutdown.trigger();
            if let Some(reason) = metrics_failure(metrics_task.await) {
                tracing::error!(error = %reason, "Metrics endpoint failed");
            }
            Ok(())
        }
        result = &mut metrics_task => {
            let failure = metrics_failure(result);
            if let Some(reason) = &failure {
                tracing::error!(error = %reason, "Metrics endpoint stopped, shutting down");
                shutdown.trigger();
            }
            serve.await?;
            match failure {
                Some(reason) => Err(ProxyError::Metrics(reason)),
                None => Ok(()),
            }
        }
    }
}

fn metrics_failure(result: std::result::Result<io::Result<()>, JoinError>) -> Option<String> {
    match result {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(e) => Some(format!("metrics task panicked: {}", e)),
    }
}

/// Bind a listener; failure is a startup error naming the address.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ProxyError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    tracing::info!(address = %listener.local_addr()?, "Listener bound");
    Ok(listener)
}
