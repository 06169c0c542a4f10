//! Request filtering subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (path, query, headers)
//!     → classifier.rs (ordered checks, first match wins)
//!     → rules.rs (exact paths, patterns, prefixes, discovery endpoints)
//!     → Return: Decision::Allowed or Decision::Blocked { reason, status }
//!
//! Rule compilation (at startup):
//!     RulesConfig
//!     → compile patterns, build lookup sets
//!     → freeze as immutable RuleSet behind Arc
//! ```
//!
//! # Design Decisions
//! - Classification is pure: no logging, no I/O, no mutation
//! - Deterministic: same input always yields the same decision
//! - Fail closed: a path no rule allows is blocked

pub mod classifier;
pub mod rules;

pub use classifier::{BlockReason, Classifier, Decision, X_FORWARDED_FOR};
pub use rules::RuleSet;
