//! In-process record store
//!
//! Uses DashMap for concurrent reads/writes with minimal contention. Expired
//! values are dropped lazily on read and in bulk by [`MemoryStore::purge_expired`].

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;
use tokio::time::Instant;

use tokenagg_core::{StoreError, StoreResult};

use crate::store::RecordStore;

/// Stored value with optional expiry
#[derive(Debug, Clone)]
struct ValueEntry {
    bytes: Vec<u8>,
    expires_at: Option<Instant>,
}

impl ValueEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| now >= at)
    }
}

/// Totally ordered score
#[derive(Debug, Clone, Copy)]
struct Score(f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Scored set ordered ascending by (score, member)
#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<String, Score>,
    ordered: BTreeSet<(Score, String)>,
}

impl SortedSet {
    fn insert(&mut self, member: &str, score: f64) {
        if let Some(previous) = self.scores.insert(member.to_string(), Score(score)) {
            self.ordered.remove(&(previous, member.to_string()));
        }
        self.ordered.insert((Score(score), member.to_string()));
    }

    fn rev_range(&self, start: usize, stop: usize) -> Vec<String> {
        if start > stop {
            return vec![];
        }
        self.ordered
            .iter()
            .rev()
            .skip(start)
            .take((stop - start).saturating_add(1))
            .map(|(_, member)| member.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.scores.len()
    }
}

/// Shared in-memory store
#[derive(Debug)]
pub struct MemoryStore {
    values: DashMap<String, ValueEntry>,
    sorted_sets: DashMap<String, SortedSet>,

    /// When false every call fails with `StoreError::Unavailable`
    available: AtomicBool,

    /// Stats
    write_count: AtomicU64,
    last_write: RwLock<Instant>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
            sorted_sets: DashMap::new(),
            available: AtomicBool::new(true),
            write_count: AtomicU64::new(0),
            last_write: RwLock::new(Instant::now()),
        }
    }

    /// Simulate an outage of the backing store
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        }
    }

    fn record_write(&self) {
        self.write_count.fetch_add(1, AtomicOrdering::Relaxed);
        *self.last_write.write() = Instant::now();
    }

    /// Drop all expired values, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.values.len();
        self.values.retain(|_, v| !v.is_expired(now));
        before.saturating_sub(self.values.len())
    }

    /// Remaining time to live of a key, if it has one
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let entry = self.values.get(key)?;
        let expires_at = entry.expires_at?;
        Some(expires_at.saturating_duration_since(Instant::now()))
    }

    /// Stats
    pub fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            key_count: self.values.len(),
            sorted_set_count: self.sorted_sets.len(),
            write_count: self.write_count.load(AtomicOrdering::Relaxed),
            last_write_age: self.last_write.read().elapsed(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.check_available()?;

        let now = Instant::now();
        let expired = match self.values.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.bytes.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.values.remove_if(key, |_, v| v.is_expired(now));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: Option<u64>) -> StoreResult<()> {
        self.check_available()?;

        if self.sorted_sets.contains_key(key) {
            return Err(StoreError::WrongType(key.to_string()));
        }

        let entry = ValueEntry {
            bytes: value,
            expires_at: ttl_secs.map(|secs| Instant::now() + Duration::from_secs(secs)),
        };

        self.values.insert(key.to_string(), entry);
        self.record_write();
        Ok(())
    }

    async fn zadd(&self, set_key: &str, score: f64, member: &str) -> StoreResult<()> {
        self.check_available()?;

        if score.is_nan() {
            return Err(StoreError::Serialization(format!(
                "score for {} in {} is not a number",
                member, set_key
            )));
        }
        if self.values.contains_key(set_key) {
            return Err(StoreError::WrongType(set_key.to_string()));
        }

        self.sorted_sets
            .entry(set_key.to_string())
            .or_default()
            .insert(member, score);
        self.record_write();
        Ok(())
    }

    async fn zrevrange(&self, set_key: &str, start: usize, stop: usize) -> StoreResult<Vec<String>> {
        self.check_available()?;

        Ok(self
            .sorted_sets
            .get(set_key)
            .map(|set| set.rev_range(start, stop))
            .unwrap_or_default())
    }

    async fn zcard(&self, set_key: &str) -> StoreResult<usize> {
        self.check_available()?;

        Ok(self.sorted_sets.get(set_key).map(|set| set.len()).unwrap_or(0))
    }
}

/// Statistics about the memory store
#[derive(Debug, Clone)]
pub struct MemoryStoreStats {
    pub key_count: usize,
    pub sorted_set_count: usize,
    pub write_count: u64,
    pub last_write_age: Duration,
}
