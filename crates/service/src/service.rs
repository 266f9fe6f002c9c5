//! Read-side service: paginated token listing, health and subscriptions

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error};

use tokenagg_aggregator::Notifier;
use tokenagg_core::{Notification, StoreResult, TokenRecord};
use tokenagg_store::{Pager, VolumeIndex};

/// Pagination request parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTokensRequest {
    /// Page size; the service default applies when absent
    #[serde(default)]
    pub limit: Option<usize>,
    /// Opaque cursor from a previous response
    #[serde(default)]
    pub cursor: Option<String>,
}

/// One page of tokens ordered by descending volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPage {
    pub data: Vec<TokenRecord>,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<String>,
    /// Distinct tracked addresses
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub ok: bool,
    pub tracked_tokens: Option<usize>,
    pub error: Option<String>,
}

/// Query facade over the volume index and record store
#[derive(Clone)]
pub struct TokenService {
    pager: Pager,
    index: VolumeIndex,
    notifier: Arc<Notifier>,
    default_limit: usize,
}

impl TokenService {
    pub fn new(pager: Pager, index: VolumeIndex, notifier: Arc<Notifier>, default_limit: usize) -> Self {
        Self {
            pager,
            index,
            notifier,
            default_limit,
        }
    }

    /// List tokens by descending volume.
    ///
    /// Malformed cursors restart from the first page. Store failures are
    /// returned to the caller, who owns any retry.
    pub async fn list_tokens(&self, request: ListTokensRequest) -> StoreResult<TokenPage> {
        let limit = request.limit.unwrap_or(self.default_limit);
        debug!("list_tokens limit={} cursor={:?}", limit, request.cursor);

        let page = self.pager.page(limit, request.cursor.as_deref()).await?;
        let count = self.index.size().await?;

        Ok(TokenPage {
            data: page.records,
            next_cursor: page.next_cursor,
            count,
        })
    }

    /// Store reachability probe
    pub async fn health(&self) -> HealthStatus {
        match self.index.size().await {
            Ok(count) => HealthStatus {
                ok: true,
                tracked_tokens: Some(count),
                error: None,
            },
            Err(e) => {
                error!("Store health check failed: {}", e);
                HealthStatus {
                    ok: false,
                    tracked_tokens: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Live `token_update` / `volume_spike` events
    pub fn subscribe(&self) -> BroadcastStream<Notification> {
        self.notifier.stream()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokenagg_store::{decode_cursor, MemoryStore, RecordRepository};
    use tokio_test::{assert_err, assert_ok};

    async fn service_with(count: usize) -> (Arc<MemoryStore>, TokenService) {
        let store = Arc::new(MemoryStore::new());
        let records = RecordRepository::new(store.clone());
        let index = VolumeIndex::new(store.clone());

        for i in 0..count {
            let mut record = TokenRecord::empty(format!("tok{:02}", i).into(), Utc::now());
            record.volume = i as f64;
            records.put(&record, None).await.unwrap();
            index.upsert(&record.address, record.volume).await.unwrap();
        }

        let service = TokenService::new(
            Pager::new(index.clone(), records),
            index,
            Arc::new(Notifier::new(16, true)),
            20,
        );
        (store, service)
    }

    #[tokio::test]
    async fn test_default_limit_and_count() {
        let (_, service) = service_with(25).await;

        let page = service.list_tokens(ListTokensRequest::default()).await.unwrap();
        assert_eq!(page.data.len(), 20);
        assert_eq!(page.count, 25);
        assert_eq!(page.data[0].address.as_str(), "tok24");
        assert_eq!(decode_cursor(page.next_cursor.as_deref()), 20);

        let rest = service
            .list_tokens(ListTokensRequest {
                limit: None,
                cursor: page.next_cursor.clone(),
            })
            .await
            .unwrap();
        assert_eq!(rest.data.len(), 5);
        assert!(rest.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_small_index_ends_immediately() {
        let (_, service) = service_with(3).await;
        let page = service
            .list_tokens(ListTokensRequest {
                limit: Some(20),
                cursor: None,
            })
            .await
            .unwrap();
        assert_eq!(page.data.len(), 3);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_garbage_cursor_restarts() {
        let (_, service) = service_with(3).await;
        let page = service
            .list_tokens(ListTokensRequest {
                limit: Some(2),
                cursor: Some("garbage!!".into()),
            })
            .await
            .unwrap();
        assert_eq!(page.data[0].address.as_str(), "tok02");
    }

    #[tokio::test]
    async fn test_response_wire_names() {
        let (_, service) = service_with(1).await;
        let page = assert_ok!(service.list_tokens(ListTokensRequest::default()).await);
        let json = serde_json::to_value(&page).unwrap();
        assert!(json.get("nextCursor").is_some());
        assert_eq!(json["count"], 1);
        assert_eq!(json["data"][0]["address"], "tok00");
    }

    #[tokio::test]
    async fn test_health_reflects_store() {
        let (store, service) = service_with(2).await;
        let health = service.health().await;
        assert!(health.ok);
        assert_eq!(health.tracked_tokens, Some(2));

        store.set_available(false);
        let health = service.health().await;
        assert!(!health.ok);
        assert!(health.error.is_some());
        assert_err!(service.list_tokens(ListTokensRequest::default()).await);
    }
}
