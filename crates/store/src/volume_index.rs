//! Volume-ranked index of all known tokens
//!
//! A derived view over the record store: one scored-set member per address,
//! scored by the merged record's cumulative volume. The merge path is its only
//! writer.

use std::sync::Arc;

use tokenagg_core::{StoreResult, TokenAddress};

use crate::store::RecordStore;

/// Default sorted-set key
pub const VOLUME_INDEX_KEY: &str = "tokens:by_volume";

#[derive(Clone)]
pub struct VolumeIndex {
    store: Arc<dyn RecordStore>,
    key: String,
}

impl VolumeIndex {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_key(store, VOLUME_INDEX_KEY)
    }

    pub fn with_key(store: Arc<dyn RecordStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Set an address's score, replacing any previous one
    pub async fn upsert(&self, address: &TokenAddress, volume: f64) -> StoreResult<()> {
        self.store.zadd(&self.key, volume, address.as_str()).await
    }

    /// Addresses ranked `start..=stop` by descending volume
    pub async fn range_descending(&self, start: usize, stop: usize) -> StoreResult<Vec<TokenAddress>> {
        let members = self.store.zrevrange(&self.key, start, stop).await?;
        Ok(members.into_iter().map(TokenAddress::from).collect())
    }

    /// Number of distinct addresses
    pub async fn size(&self) -> StoreResult<usize> {
        self.store.zcard(&self.key).await
    }
}
