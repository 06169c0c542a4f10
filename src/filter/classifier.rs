//! Request classification.
//!
//! Decides, before any byte reaches the metadata server, whether a request
//! is forwarded or rejected. Checks run in a fixed order and the first one
//! that fires decides:
//!
//! 1. `?recursive=<non-empty>` → blocked
//! 2. `X-Forwarded-For` present → blocked
//! 3. path is a concealed path → blocked
//! 4. path matches a concealed pattern → blocked
//! 5. path starts with a known prefix → allowed
//! 6. path is a discovery endpoint → allowed
//! 7. anything else → blocked
//!
//! The path is percent-decoded first; bytes that are not UTF-8 become
//! U+FFFD, which no rule matches.
//!
//! Block rules sit in front of allow rules so a concealed attribute under
//! an allowed prefix stays concealed.

use std::fmt;
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, StatusCode, Uri};
use url::form_urlencoded;

use crate::filter::rules::RuleSet;

/// Header a relaying intermediary adds; never accepted from callers.
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const RECURSIVE_PARAM: &str = "recursive";

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    RecursiveQuery,
    ForwardedHeader,
    ConcealedEndpoint,
    ConcealedPattern,
    NotAllowed,
}

impl BlockReason {
    /// Short label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::RecursiveQuery => "recursive_query",
            BlockReason::ForwardedHeader => "forwarded_header",
            BlockReason::ConcealedEndpoint => "concealed_endpoint",
            BlockReason::ConcealedPattern => "concealed_pattern",
            BlockReason::NotAllowed => "not_allowed",
        }
    }

    /// Client-facing explanation.
    pub fn message(&self) -> &'static str {
        match self {
            BlockReason::RecursiveQuery => {
                "?recursive calls are not allowed by the metadata proxy."
            }
            BlockReason::ForwardedHeader => {
                "Calls with X-Forwarded-For header are not allowed by the metadata proxy."
            }
            BlockReason::ConcealedEndpoint | BlockReason::ConcealedPattern => {
                "This metadata endpoint is concealed."
            }
            BlockReason::NotAllowed => "This metadata API is not allowed by the metadata proxy.",
        }
    }

    /// Every policy rejection is a 403.
    pub fn status(&self) -> StatusCode {
        StatusCode::FORBIDDEN
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of classifying one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Blocked { reason: BlockReason, status: StatusCode },
}

impl Decision {
    fn block(reason: BlockReason) -> Self {
        Decision::Blocked {
            reason,
            status: reason.status(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Stateless classifier over a shared, read-only [`RuleSet`].
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Arc<RuleSet>,
}

impl Classifier {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    /// Classify a request by its target and headers.
    ///
    /// Pure: no logging, no I/O, same input always yields the same decision.
    pub fn classify(&self, uri: &Uri, headers: &HeaderMap) -> Decision {
        if has_recursive_query(uri.query()) {
            return Decision::block(BlockReason::RecursiveQuery);
        }

        if headers.contains_key(X_FORWARDED_FOR) {
            return Decision::block(BlockReason::ForwardedHeader);
        }

        let decoded = urlencoding::decode_binary(uri.path().as_bytes());
        self.classify_path(&String::from_utf8_lossy(&decoded))
    }

    /// Path-only part of the rule chain (checks 3 to 7).
    pub fn classify_path(&self, path: &str) -> Decision {
        if self.rules.is_concealed_path(path) {
            return Decision::block(BlockReason::ConcealedEndpoint);
        }
        if self.rules.matches_concealed_pattern(path) {
            return Decision::block(BlockReason::ConcealedPattern);
        }
        if self.rules.has_known_prefix(path) || self.rules.is_discovery_endpoint(path) {
            return Decision::Allowed;
        }
        Decision::block(BlockReason::NotAllowed)
    }
}

/// True when any `recursive` parameter carries a non-empty value.
fn has_recursive_query(query: Option<&str>) -> bool {
    query.is_some_and(|q| {
        form_urlencoded::parse(q.as_bytes())
            .any(|(key, value)| key == RECURSIVE_PARAM && !value.is_empty())
    })
}
