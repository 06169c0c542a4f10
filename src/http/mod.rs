//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace span, catch-all handler)
//!     → filter::Classifier (allow or block, before any upstream I/O)
//!     → blocked: response.rs (plain-text 403)
//!     → allowed: forward.rs (retarget, strip headers, relay)
//!     → Send to client, record metric
//! ```

pub mod forward;
pub mod response;
pub mod server;

pub use forward::{ForwardError, Forwarder};
pub use server::{AppState, HttpServer};
