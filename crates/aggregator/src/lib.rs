//! Token observation aggregator
//!
//! Features:
//! - Pluggable observation sources, polled concurrently each cycle
//! - Per-address serialized read-merge-write with volume re-indexing
//! - Best-effort change notifications to subscribers
//! - Cooperative shutdown between cycles

pub mod aggregator;
pub mod coordinator;
pub mod notifier;
pub mod sources;

pub use aggregator::{Aggregator, AggregatorConfig, AggregatorStats, CycleReport};
pub use coordinator::{BatchReport, MergeCoordinator, MergeOutcome};
pub use notifier::{Notifier, NotifierStats};
pub use sources::{FileSource, ObservationSource};
