//! Compiled path rules.
//!
//! # Responsibilities
//! - Hold the concealed paths, concealed patterns, known prefixes and
//!   discovery endpoints in lookup-friendly containers
//! - Answer single-rule membership questions for the classifier
//!
//! # Design Decisions
//! - Compiled once at startup, immutable at runtime (shared via Arc)
//! - Exact-match tables are hash sets; prefixes and patterns keep config order
//! - Patterns are unanchored: a match anywhere in the path counts

use std::collections::HashSet;

use regex::Regex;

use crate::config::RulesConfig;
use crate::error::ProxyError;

/// Read-only rule tables consulted for every request.
#[derive(Debug, Clone)]
pub struct RuleSet {
    concealed_paths: HashSet<String>,
    concealed_patterns: Vec<Regex>,
    known_prefixes: Vec<String>,
    discovery_endpoints: HashSet<String>,
}

impl RuleSet {
    /// Compile the rule tables from configuration.
    pub fn from_config(config: &RulesConfig) -> Result<Self, ProxyError> {
        let concealed_patterns = config
            .concealed_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ProxyError::InvalidRule {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            concealed_paths: config.concealed_paths.iter().cloned().collect(),
            concealed_patterns,
            known_prefixes: config.known_prefixes.clone(),
            discovery_endpoints: config.discovery_endpoints.iter().cloned().collect(),
        })
    }

    pub fn is_concealed_path(&self, path: &str) -> bool {
        self.concealed_paths.contains(path)
    }

    pub fn matches_concealed_pattern(&self, path: &str) -> bool {
        self.concealed_patterns.iter().any(|re| re.is_match(path))
    }

    pub fn has_known_prefix(&self, path: &str) -> bool {
        self.known_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn is_discovery_endpoint(&self, path: &str) -> bool {
        self.discovery_endpoints.contains(path)
    }
}
