//! Change significance detection
//!
//! Features:
//! - Decides whether a merge is worth a `token_update` notification
//! - Detects `volume_spike` events
//! - Thresholds supplied by a configurable policy

pub mod significance;

pub use significance::{relative_price_change, SignificanceDetector};
