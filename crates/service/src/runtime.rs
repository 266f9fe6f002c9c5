//! Wiring of store, aggregator and read service from settings

use std::sync::Arc;
use tracing::info;

use tokenagg_aggregator::{Aggregator, AggregatorConfig, FileSource, MergeCoordinator, Notifier};
use tokenagg_core::AggregatorSettings;
use tokenagg_detector::SignificanceDetector;
use tokenagg_store::{Pager, RecordRepository, RecordStore, VolumeIndex};

use crate::service::TokenService;

/// Fully wired components sharing one store and one notifier
pub struct Runtime {
    pub aggregator: Arc<Aggregator>,
    pub service: TokenService,
}

impl Runtime {
    pub fn build(settings: &AggregatorSettings, store: Arc<dyn RecordStore>) -> Self {
        let records = RecordRepository::new(Arc::clone(&store));
        let index = VolumeIndex::new(store);
        let notifier = Arc::new(Notifier::new(
            settings.notification_capacity,
            settings.enable_notifications,
        ));

        let coordinator = Arc::new(MergeCoordinator::new(
            records.clone(),
            index.clone(),
            SignificanceDetector::new(settings.significance),
            Arc::clone(&notifier),
            settings.record_ttl_secs(),
        ));

        let config = AggregatorConfig {
            poll_interval: settings.poll_interval(),
            source_timeout: settings.source_timeout(),
            merge_concurrency: settings.merge_concurrency,
        };

        let mut aggregator = Aggregator::new(config, coordinator);
        for path in &settings.sources {
            info!("Registering file source {}", path.display());
            aggregator = aggregator.with_source(Arc::new(FileSource::new(path.clone())));
        }

        let service = TokenService::new(
            Pager::new(index.clone(), records),
            index,
            notifier,
            settings.default_page_limit,
        );

        Self {
            aggregator: Arc::new(aggregator),
            service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ListTokensRequest;
    use std::io::Write as _;
    use tokenagg_store::MemoryStore;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_cycle_flows_to_service_and_subscribers() {
        let dir = std::env::temp_dir().join(format!("tokenagg-runtime-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feed.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, r#"{{"address":"a","price":1.0,"volume":5.0}}"#).unwrap();
        writeln!(file, r#"{{"address":"b","price":2.0,"volume":9.0}}"#).unwrap();
        drop(file);

        let settings = AggregatorSettings {
            sources: vec![path],
            ..Default::default()
        };
        let runtime = Runtime::build(&settings, Arc::new(MemoryStore::new()));
        assert_eq!(runtime.aggregator.source_count(), 1);

        let mut events = runtime.service.subscribe();
        let report = runtime.aggregator.poll_once().await;
        assert_eq!(report.batch.merged, 2);

        let page = runtime
            .service
            .list_tokens(ListTokensRequest::default())
            .await
            .unwrap();
        assert_eq!(page.count, 2);
        assert_eq!(page.data[0].address.as_str(), "b");

        let first = events.next().await.unwrap().unwrap();
        assert_eq!(first.kind(), "token_update");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_disabled_notifications_still_merge() {
        let settings = AggregatorSettings {
            enable_notifications: false,
            ..Default::default()
        };
        let runtime = Runtime::build(&settings, Arc::new(MemoryStore::new()));

        runtime
            .aggregator
            .coordinator()
            .ingest(tokenagg_core::NormalizedObservation::new("a").volume(1.0))
            .await
            .unwrap();

        assert_eq!(runtime.aggregator.coordinator().notifier().stats().published, 0);
        assert!(runtime.service.health().await.ok);
    }
}
