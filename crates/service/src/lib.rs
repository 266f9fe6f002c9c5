//! Token aggregation service
//!
//! Wires the polling aggregator to the store and exposes the read side:
//! volume-ranked pagination, a health probe and live notifications.

pub mod runtime;
pub mod service;

pub use runtime::Runtime;
pub use service::{HealthStatus, ListTokensRequest, TokenPage, TokenService};
