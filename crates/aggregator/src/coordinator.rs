//! Merge coordination - the write path for canonical records
//!
//! One logical step per observation: read prior record, merge, persist,
//! re-score in the volume index, then notify. Steps for the same address
//! are serialized; different addresses proceed concurrently.

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use tokenagg_core::{
    merge, Notification, NormalizedObservation, StoreResult, TokenAddress, TokenRecord,
};
use tokenagg_detector::SignificanceDetector;
use tokenagg_store::{RecordRepository, VolumeIndex};

use crate::notifier::Notifier;

/// Result of one merge step
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub record: TokenRecord,
    pub created: bool,
    pub notifications: Vec<Notification>,
}

/// Totals for a batch of observations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub observations: usize,
    pub merged: usize,
    pub created: usize,
    pub notifications: usize,
    pub store_failures: usize,
}

impl BatchReport {
    fn absorb(&mut self, other: BatchReport) {
        self.observations += other.observations;
        self.merged += other.merged;
        self.created += other.created;
        self.notifications += other.notifications;
        self.store_failures += other.store_failures;
    }
}

pub struct MergeCoordinator {
    records: RecordRepository,
    index: VolumeIndex,
    detector: SignificanceDetector,
    notifier: Arc<Notifier>,
    record_ttl_secs: Option<u64>,
    locks: DashMap<TokenAddress, Arc<Mutex<()>>>,
}

impl MergeCoordinator {
    pub fn new(
        records: RecordRepository,
        index: VolumeIndex,
        detector: SignificanceDetector,
        notifier: Arc<Notifier>,
        record_ttl_secs: Option<u64>,
    ) -> Self {
        Self {
            records,
            index,
            detector,
            notifier,
            record_ttl_secs,
            locks: DashMap::new(),
        }
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    fn lock_for(&self, address: &TokenAddress) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(address.clone()).or_default().value())
    }

    fn release_lock(&self, address: &TokenAddress) {
        self.locks.remove_if(address, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Merge one observation into its canonical record.
    ///
    /// A store failure aborts the step: nothing after the failing call runs,
    /// and no notification goes out for a merge that was not persisted.
    pub async fn ingest(&self, observation: NormalizedObservation) -> StoreResult<MergeOutcome> {
        let address = observation.address.clone();
        let lock = self.lock_for(&address);
        let result = {
            let _guard = lock.lock().await;
            self.ingest_locked(&observation).await
        };
        drop(lock);
        self.release_lock(&address);
        result
    }

    async fn ingest_locked(&self, observation: &NormalizedObservation) -> StoreResult<MergeOutcome> {
        let existing = self.records.get(&observation.address).await?;
        let merged = merge(existing.as_ref(), observation);

        self.records.put(&merged, self.record_ttl_secs).await?;
        self.index.upsert(&merged.address, merged.volume).await?;

        let notifications = self.detector.evaluate(existing.as_ref(), &merged);
        for event in &notifications {
            self.notifier.publish(event.clone());
        }

        debug!(
            "Merged {} price={:.6} volume={:.2} events={}",
            merged.address,
            merged.price,
            merged.volume,
            notifications.len()
        );

        Ok(MergeOutcome {
            created: existing.is_none(),
            record: merged,
            notifications,
        })
    }

    /// Merge a batch, up to `concurrency` addresses at a time.
    ///
    /// Observations for one address are applied in batch order. After a
    /// store failure the rest of that address's observations are skipped.
    pub async fn ingest_batch(
        &self,
        observations: Vec<NormalizedObservation>,
        concurrency: usize,
    ) -> BatchReport {
        let groups = group_by_address(observations);

        stream::iter(groups)
            .map(|(address, group)| self.ingest_group(address, group))
            .buffer_unordered(concurrency.max(1))
            .fold(BatchReport::default(), |mut total, report| async move {
                total.absorb(report);
                total
            })
            .await
    }

    async fn ingest_group(
        &self,
        address: TokenAddress,
        group: Vec<NormalizedObservation>,
    ) -> BatchReport {
        let mut report = BatchReport {
            observations: group.len(),
            ..Default::default()
        };

        for observation in group {
            match self.ingest(observation).await {
                Ok(outcome) => {
                    report.merged += 1;
                    report.created += usize::from(outcome.created);
                    report.notifications += outcome.notifications.len();
                }
                Err(e) => {
                    warn!("Merge for {} failed, skipping rest of cycle: {}", address, e);
                    report.store_failures += 1;
                    break;
                }
            }
        }

        report
    }
}

/// Group observations by address, keeping first-seen address order
fn group_by_address(
    observations: Vec<NormalizedObservation>,
) -> Vec<(TokenAddress, Vec<NormalizedObservation>)> {
    let mut positions: HashMap<TokenAddress, usize> = HashMap::new();
    let mut groups: Vec<(TokenAddress, Vec<NormalizedObservation>)> = Vec::new();

    for observation in observations {
        match positions.get(&observation.address) {
            Some(&i) => groups[i].1.push(observation),
            None => {
                positions.insert(observation.address.clone(), groups.len());
                groups.push((observation.address.clone(), vec![observation]));
            }
        }
    }

    groups
}
