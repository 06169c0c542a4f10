//! Metadata proxy.
//!
//! Sits between workloads and the instance metadata server and conceals
//! the endpoints they must not reach.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────┐
//!                         │                METADATA PROXY                 │
//!                         │                                               │
//!   Client Request        │  ┌──────────┐    ┌────────────┐               │
//!   ──────────────────────┼─▶│   http   │───▶│   filter   │──── blocked ──┼──▶ 403
//!                         │  │  server  │    │ classifier │               │
//!                         │  └──────────┘    └─────┬──────┘               │
//!                         │                        │ allowed              │
//!                         │                        ▼                      │
//!   Client Response       │                  ┌────────────┐               │
//!   ◀─────────────────────┼──────────────────│  forward   │◀──────────────┼──── Metadata
//!                         │                  │  (relay)   │               │     Server
//!                         │                  └────────────┘               │
//!                         │                                               │
//!                         │  config · observability · lifecycle           │
//!                         └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process;

use clap::Parser;

use metadata_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use metadata_proxy::lifecycle::startup;
use metadata_proxy::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "metadata-proxy", version)]
#[command(about = "Filtering reverse proxy for the instance metadata server", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Proxy listen address, e.g. 127.0.0.1:988
    #[arg(long)]
    listen: Option<String>,

    /// Metrics listen address, e.g. 127.0.0.1:989
    #[arg(long)]
    metrics_listen: Option<String>,

    /// Upstream metadata server URL, e.g. http://169.254.169.254
    #[arg(long)]
    upstream: Option<String>,

    /// Disable the metrics endpoint
    #[arg(long)]
    no_metrics: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Command-line flags take precedence over the file.
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(addr) = &self.listen {
            config.listener.bind_address = addr.clone();
        }
        if let Some(addr) = &self.metrics_listen {
            config.observability.metrics_address = addr.clone();
        }
        if let Some(url) = &self.upstream {
            config.upstream.url = url.clone();
        }
        if self.no_metrics {
            config.observability.metrics_enabled = false;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }

    /// Parse the file, apply flags, then validate the result once.
    fn load(&self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("metadata-proxy: {}", e);
            process::exit(1);
        }
    };

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        metrics_enabled = config.observability.metrics_enabled,
        "metadata-proxy starting"
    );

    if let Err(e) = startup::run(config).await {
        tracing::error!(error = %e, "Fatal error");
        process::exit(1);
    }

    tracing::info!("Shutdown complete");
}
