//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and the upstream URL
//! - Check that every concealed pattern compiles
//! - Refuse rule sets that would open every path
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["text", "json"];

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("upstream.url: {0}")]
    InvalidUpstream(String),

    #[error("rules.concealed_patterns: '{pattern}' does not compile: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("rules.known_prefixes: empty prefix would allow every path")]
    EmptyPrefix,

    #[error("observability.log_level: unknown level '{0}'")]
    InvalidLogLevel(String),

    #[error("observability.log_format: unknown format '{0}'")]
    InvalidLogFormat(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: obs.metrics_address.clone(),
        });
    }
    if !LOG_LEVELS.contains(&obs.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::InvalidLogLevel(obs.log_level.clone()));
    }
    if !LOG_FORMATS.contains(&obs.log_format.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::InvalidLogFormat(obs.log_format.clone()));
    }

    if let Err(reason) = check_upstream_url(&config.upstream.url) {
        errors.push(ValidationError::InvalidUpstream(reason));
    }

    for pattern in &config.rules.concealed_patterns {
        if let Err(e) = Regex::new(pattern) {
            errors.push(ValidationError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            });
        }
    }

    if config.rules.known_prefixes.iter().any(|p| p.is_empty()) {
        errors.push(ValidationError::EmptyPrefix);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// The upstream must be a bare `http://host[:port]` URL.
pub(crate) fn check_upstream_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("'{}' is not a URL: {}", raw, e))?;

    if url.scheme() != "http" {
        return Err(format!("unsupported scheme '{}', only http is supported", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err(format!("'{}' has no host", raw));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(format!("'{}' must not carry a path", raw));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(format!("'{}' must not carry a query or fragment", raw));
    }

    Ok(url)
}
