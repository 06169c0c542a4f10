//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so an empty file yields the stock deployment in
//! front of the GCE metadata server.

use serde::{Deserialize, Serialize};

/// Root configuration for the metadata proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The metadata server requests are relayed to.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Path rules applied to every inbound request.
    pub rules: RulesConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:988").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:988".to_string(),
        }
    }
}

/// Upstream metadata server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the metadata server. Scheme and authority only.
    pub url: String,

    /// Connection establishment timeout in seconds (0 = connector default).
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://169.254.169.254".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format (text, json).
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            metrics_enabled: true,
            metrics_address: "127.0.0.1:989".to_string(),
        }
    }
}

/// Path rules, in the raw form they are written in config files.
///
/// Compiled once at startup into a [`RuleSet`](crate::filter::RuleSet).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Paths that are always blocked.
    pub concealed_paths: Vec<String>,

    /// Regular expressions; a path matching any of them is blocked.
    pub concealed_patterns: Vec<String>,

    /// Path prefixes that may be proxied.
    pub known_prefixes: Vec<String>,

    /// Exact paths used by clients to discover API versions.
    pub discovery_endpoints: Vec<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            concealed_paths: to_strings(&[
                "/0.1/meta-data/attributes/kube-env",
                "/computeMetadata/v1beta1/instance/attributes/kube-env",
                "/computeMetadata/v1/instance/attributes/kube-env",
            ]),
            concealed_patterns: to_strings(&[
                "/0.1/meta-data/service-accounts/.+/identity",
                "/computeMetadata/v1beta1/instance/service-accounts/.+/identity",
                "/computeMetadata/v1/instance/service-accounts/.+/identity",
            ]),
            known_prefixes: to_strings(&[
                "/0.1/meta-data/",
                "/computeMetadata/v1beta1/",
                "/computeMetadata/v1/",
            ]),
            discovery_endpoints: to_strings(&[
                "",
                "/",
                "/0.1",
                "/0.1/",
                "/0.1/meta-data",
                "/computeMetadata",
                "/computeMetadata/",
                "/computeMetadata/v1beta1",
                "/computeMetadata/v1",
            ]),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
