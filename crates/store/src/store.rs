//! Record store collaborator interface

use async_trait::async_trait;
use std::sync::Arc;

use tokenagg_core::StoreResult;

/// Key/value store with TTL support and scored sets.
///
/// Calls are expected to be bounded-latency; timeouts and retries belong to
/// the implementation, not to callers. A failed write returns an error and
/// must not be observable by later reads.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: Option<u64>) -> StoreResult<()>;

    /// Set `member`'s score, replacing any previous score
    async fn zadd(&self, set_key: &str, score: f64, member: &str) -> StoreResult<()>;

    /// Members ranked `start..=stop` by descending score
    async fn zrevrange(&self, set_key: &str, start: usize, stop: usize) -> StoreResult<Vec<String>>;

    async fn zcard(&self, set_key: &str) -> StoreResult<usize>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: Option<u64>) -> StoreResult<()> {
        (**self).set(key, value, ttl_secs).await
    }

    async fn zadd(&self, set_key: &str, score: f64, member: &str) -> StoreResult<()> {
        (**self).zadd(set_key, score, member).await
    }

    async fn zrevrange(&self, set_key: &str, start: usize, stop: usize) -> StoreResult<Vec<String>> {
        (**self).zrevrange(set_key, start, stop).await
    }

    async fn zcard(&self, set_key: &str) -> StoreResult<usize> {
        (**self).zcard(set_key).await
    }
}
