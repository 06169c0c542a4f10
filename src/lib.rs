//! Security-filtering reverse proxy for the cloud instance metadata server.
//!
//! Every request is classified against a fixed rule set before anything is
//! sent upstream. Blocked requests are answered locally with a plain-text
//! 403; allowed ones are relayed verbatim to the metadata server.

pub mod config;
pub mod error;
pub mod filter;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use error::{ProxyError, Result};
pub use filter::{Classifier, Decision, RuleSet};
pub use http::{Forwarder, HttpServer};
pub use lifecycle::Shutdown;
