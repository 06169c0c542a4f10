//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request handling produces:
//!     → logging.rs (structured log events, per-request span)
//!     → metrics.rs (request counter by outcome and status)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, separate listener)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON optional) for machine parsing
//! - Request ID lives in the log span only; it is never sent upstream
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
