//! Cursor pagination over the volume index
//!
//! A cursor is base64 of `{"offset": n}`. Anything that does not decode to a
//! non-negative integer offset restarts from the top.
//!
//! Pages are not snapshots: the index can change between the rank query and
//! the record lookups, so a token may move between pages or vanish from one.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tokenagg_core::{StoreResult, TokenRecord};

use crate::records::RecordRepository;
use crate::volume_index::VolumeIndex;

/// Decoded pagination position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(default)]
    pub offset: usize,
}

impl Cursor {
    pub fn encode(&self) -> String {
        // Serializing a struct of one integer cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    pub fn decode(token: &str) -> Option<Self> {
        let bytes = STANDARD.decode(token.trim()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

pub fn encode_cursor(offset: usize) -> String {
    Cursor { offset }.encode()
}

/// Offset encoded in a cursor; absent or malformed cursors give 0
pub fn decode_cursor(token: Option<&str>) -> usize {
    token.and_then(Cursor::decode).map(|c| c.offset).unwrap_or(0)
}

/// One page of records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub records: Vec<TokenRecord>,
    pub next_cursor: Option<String>,
}

#[derive(Clone)]
pub struct Pager {
    index: VolumeIndex,
    records: RecordRepository,
}

impl Pager {
    pub fn new(index: VolumeIndex, records: RecordRepository) -> Self {
        Self { index, records }
    }

    /// Records ranked `[offset, offset + limit)` by descending volume.
    ///
    /// `next_cursor` is `None` once the index returns fewer than `limit`
    /// addresses. A zero limit yields an empty final page.
    pub async fn page(&self, limit: usize, cursor: Option<&str>) -> StoreResult<Page> {
        if limit == 0 {
            return Ok(Page {
                records: vec![],
                next_cursor: None,
            });
        }

        let offset = decode_cursor(cursor);
        let stop = offset.saturating_add(limit - 1);

        let addresses = self.index.range_descending(offset, stop).await?;
        let records = self.records.get_many(&addresses).await?;

        if records.len() < addresses.len() {
            debug!(
                "Page at offset {} skipped {} expired records",
                offset,
                addresses.len() - records.len()
            );
        }

        let next_cursor = if addresses.len() < limit {
            None
        } else {
            Some(encode_cursor(offset.saturating_add(limit)))
        };

        Ok(Page {
            records,
            next_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, RecordStore};
    use chrono::Utc;
    use proptest::prelude::*;
    use std::sync::Arc;
    use tokenagg_core::TokenAddress;

    async fn seeded(volumes: &[(&str, f64)]) -> (Arc<MemoryStore>, Pager) {
        let store = Arc::new(MemoryStore::new());
        let index = VolumeIndex::new(store.clone());
        let records = RecordRepository::new(store.clone());

        for (addr, volume) in volumes {
            let mut record = TokenRecord::empty(TokenAddress::from(*addr), Utc::now());
            record.volume = *volume;
            records.put(&record, None).await.unwrap();
            index.upsert(&record.address, *volume).await.unwrap();
        }

        (store, Pager::new(index, records))
    }

    fn addresses(page: &Page) -> Vec<&str> {
        page.records.iter().map(|r| r.address.as_str()).collect()
    }

    #[test]
    fn test_cursor_offset_40_roundtrip() {
        let encoded = encode_cursor(40);
        assert_eq!(decode_cursor(Some(encoded.as_str())), 40);
        assert_eq!(Cursor::decode(&encoded), Some(Cursor { offset: 40 }));
    }

    #[test]
    fn test_cursor_wire_format() {
        let decoded = STANDARD.decode(encode_cursor(7)).unwrap();
        assert_eq!(decoded, br#"{"offset":7}"#);
    }

    #[test]
    fn test_bad_cursors_decode_to_zero() {
        assert_eq!(decode_cursor(None), 0);
        assert_eq!(decode_cursor(Some("")), 0);
        assert_eq!(decode_cursor(Some("%%%not-base64%%%")), 0);
        assert_eq!(decode_cursor(Some(STANDARD.encode("not json").as_str())), 0);
        assert_eq!(decode_cursor(Some(STANDARD.encode(r#"{"offset":-5}"#).as_str())), 0);
        assert_eq!(decode_cursor(Some(STANDARD.encode(r#"{"offset":2.5}"#).as_str())), 0);
        assert_eq!(decode_cursor(Some(STANDARD.encode(r#"{}"#).as_str())), 0);
    }

    #[tokio::test]
    async fn test_short_index_has_no_next_cursor() {
        let (_, pager) = seeded(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]).await;

        let page = pager.page(20, None).await.unwrap();
        assert_eq!(addresses(&page), vec!["c", "b", "a"]);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_walks_pages_by_descending_volume() {
        let (_, pager) =
            seeded(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0), ("e", 5.0)]).await;

        let first = pager.page(2, None).await.unwrap();
        assert_eq!(addresses(&first), vec!["e", "d"]);

        let second = pager.page(2, first.next_cursor.as_deref()).await.unwrap();
        assert_eq!(addresses(&second), vec!["c", "b"]);

        let third = pager.page(2, second.next_cursor.as_deref()).await.unwrap();
        assert_eq!(addresses(&third), vec!["a"]);
        assert!(third.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_exact_fit_returns_cursor_to_empty_page() {
        let (_, pager) = seeded(&[("a", 1.0), ("b", 2.0)]).await;

        let first = pager.page(2, None).await.unwrap();
        assert_eq!(decode_cursor(first.next_cursor.as_deref()), 2);

        let last = pager.page(2, first.next_cursor.as_deref()).await.unwrap();
        assert!(last.records.is_empty());
        assert!(last.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_missing_record_is_skipped_but_counts_toward_limit() {
        let (store, pager) = seeded(&[("a", 1.0), ("b", 2.0)]).await;
        // Indexed but never persisted
        store.zadd("tokens:by_volume", 3.0, "ghost").await.unwrap();

        let page = pager.page(3, None).await.unwrap();
        assert_eq!(addresses(&page), vec!["b", "a"]);
        assert_eq!(decode_cursor(page.next_cursor.as_deref()), 3);
    }

    #[tokio::test]
    async fn test_zero_limit_terminates() {
        let (_, pager) = seeded(&[("a", 1.0)]).await;
        let page = pager.page(0, None).await.unwrap();
        assert!(page.records.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_store_outage_propagates() {
        let (store, pager) = seeded(&[("a", 1.0)]).await;
        store.set_available(false);
        assert!(pager.page(10, None).await.is_err());
    }

    proptest! {
        #[test]
        fn prop_cursor_roundtrip(n in any::<usize>()) {
            prop_assert_eq!(decode_cursor(Some(encode_cursor(n).as_str())), n);
        }

        #[test]
        fn prop_garbage_decodes_to_zero(s in "[^A-Za-z0-9+/=]{1,32}") {
            prop_assert_eq!(decode_cursor(Some(s.as_str())), 0);
        }
    }
}
