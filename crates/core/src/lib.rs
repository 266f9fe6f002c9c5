//! Core types and utilities for the token aggregator
//!
//! This crate provides shared types used across all components:
//! - Canonical token records and normalized source observations
//! - The merge engine reconciling observations into records
//! - Subscriber notification events
//! - Settings and error types

pub mod types;
pub mod merge;
pub mod events;
pub mod config;
pub mod errors;

pub use types::*;
pub use merge::*;
pub use events::*;
pub use config::*;
pub use errors::*;
