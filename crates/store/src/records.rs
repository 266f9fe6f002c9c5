//! Typed JSON access to canonical token records

use std::sync::Arc;
use tracing::warn;

use tokenagg_core::{StoreResult, TokenAddress, TokenRecord};

use crate::store::RecordStore;

/// Reads and writes `TokenRecord`s under `token:<address>`
#[derive(Clone)]
pub struct RecordRepository {
    store: Arc<dyn RecordStore>,
}

impl RecordRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Fetch a record. Unparseable stored JSON counts as a miss.
    pub async fn get(&self, address: &TokenAddress) -> StoreResult<Option<TokenRecord>> {
        let key = address.record_key();
        let Some(bytes) = self.store.get(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Discarding malformed record at {}: {}", key, e);
                Ok(None)
            }
        }
    }

    /// Persist a record with an optional TTL
    pub async fn put(&self, record: &TokenRecord, ttl_secs: Option<u64>) -> StoreResult<()> {
        let bytes = serde_json::to_vec(record)?;
        self.store
            .set(&record.address.record_key(), bytes, ttl_secs)
            .await
    }

    /// Fetch several records in order, skipping misses
    pub async fn get_many(&self, addresses: &[TokenAddress]) -> StoreResult<Vec<TokenRecord>> {
        let mut records = Vec::with_capacity(addresses.len());
        for address in addresses {
            if let Some(record) = self.get(address).await? {
                records.push(record);
            }
        }
        Ok(records)
    }
}
