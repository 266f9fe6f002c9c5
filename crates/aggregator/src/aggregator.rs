//! Polling aggregator - runs fetch, normalize and merge cycles on an interval

use futures::future::join_all;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use tokenagg_core::{AggregatorError, AggregatorResult, NormalizedObservation, SourceError};

use crate::coordinator::{BatchReport, MergeCoordinator};
use crate::sources::ObservationSource;

/// Aggregator configuration
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub poll_interval: Duration,
    pub source_timeout: Duration,
    pub merge_concurrency: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            source_timeout: Duration::from_secs(5),
            merge_concurrency: 16,
        }
    }
}

/// Outcome of one polling cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub sources_ok: usize,
    pub source_failures: usize,
    pub batch: BatchReport,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct Counters {
    cycles: AtomicU64,
    observations: AtomicU64,
    merges: AtomicU64,
    notifications: AtomicU64,
    source_failures: AtomicU64,
    store_failures: AtomicU64,
}

/// Main polling aggregator
pub struct Aggregator {
    config: AggregatorConfig,
    sources: Vec<Arc<dyn ObservationSource>>,
    coordinator: Arc<MergeCoordinator>,
    running: AtomicBool,
    counters: Counters,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig, coordinator: Arc<MergeCoordinator>) -> Self {
        Self {
            config,
            sources: vec![],
            coordinator,
            running: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn ObservationSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn coordinator(&self) -> &Arc<MergeCoordinator> {
        &self.coordinator
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Check if running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run cycles until `shutdown` fires (or its sender is dropped).
    ///
    /// Shutdown is only observed between cycles, so a cycle in flight always
    /// completes.
    pub async fn run(&self, mut shutdown: oneshot::Receiver<()>) -> AggregatorResult<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AggregatorError::AlreadyRunning);
        }

        info!(
            "Aggregator started with {} sources, polling every {:?}",
            self.sources.len(),
            self.config.poll_interval
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.poll_once().await;
                }
                _ = &mut shutdown => {
                    info!("Aggregator shutdown requested");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Aggregator stopped after {} cycles", self.stats().cycles);
        Ok(())
    }

    /// One full cycle: fetch every source, then merge the combined batch
    pub async fn poll_once(&self) -> CycleReport {
        let start = Instant::now();

        let fetched = join_all(self.sources.iter().map(|s| self.fetch_source(s.as_ref()))).await;

        let mut report = CycleReport::default();
        let mut observations: Vec<NormalizedObservation> = Vec::new();
        for result in fetched {
            match result {
                Ok(batch) => {
                    report.sources_ok += 1;
                    observations.extend(batch);
                }
                Err(e) => {
                    warn!("Skipping source this cycle: {}", e);
                    report.source_failures += 1;
                }
            }
        }

        report.batch = self
            .coordinator
            .ingest_batch(observations, self.config.merge_concurrency)
            .await;
        report.elapsed = start.elapsed();

        self.record_cycle(&report);

        info!(
            "Aggregation complete: {} observations, {} merged, {} notifications, {} source failures in {:?}",
            report.batch.observations,
            report.batch.merged,
            report.batch.notifications,
            report.source_failures,
            report.elapsed
        );

        report
    }

    async fn fetch_source(
        &self,
        source: &dyn ObservationSource,
    ) -> Result<Vec<NormalizedObservation>, SourceError> {
        debug!("Polling source {}", source.name());
        match tokio::time::timeout(self.config.source_timeout, source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(source.name().to_string())),
        }
    }

    fn record_cycle(&self, report: &CycleReport) {
        let c = &self.counters;
        c.cycles.fetch_add(1, Ordering::Relaxed);
        c.observations.fetch_add(report.batch.observations as u64, Ordering::Relaxed);
        c.merges.fetch_add(report.batch.merged as u64, Ordering::Relaxed);
        c.notifications.fetch_add(report.batch.notifications as u64, Ordering::Relaxed);
        c.source_failures.fetch_add(report.source_failures as u64, Ordering::Relaxed);
        c.store_failures.fetch_add(report.batch.store_failures as u64, Ordering::Relaxed);
    }

    /// Get statistics
    pub fn stats(&self) -> AggregatorStats {
        let c = &self.counters;
        AggregatorStats {
            source_count: self.sources.len(),
            cycles: c.cycles.load(Ordering::Relaxed),
            observations: c.observations.load(Ordering::Relaxed),
            merges: c.merges.load(Ordering::Relaxed),
            notifications: c.notifications.load(Ordering::Relaxed),
            source_failures: c.source_failures.load(Ordering::Relaxed),
            store_failures: c.store_failures.load(Ordering::Relaxed),
        }
    }
}

/// Aggregator statistics
#[derive(Debug, Clone)]
pub struct AggregatorStats {
    pub source_count: usize,
    pub cycles: u64,
    pub observations: u64,
    pub merges: u64,
    pub notifications: u64,
    pub source_failures: u64,
    pub store_failures: u64,
}
