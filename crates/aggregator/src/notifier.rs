//! Best-effort fan-out of notifications to subscribers
//!
//! Events go to whoever is subscribed at publish time. There is no replay
//! and no delivery guarantee: slow subscribers lag and lose events.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use tokenagg_core::Notification;

pub struct Notifier {
    tx: broadcast::Sender<Notification>,
    enabled: bool,
    published: AtomicU64,
    undelivered: AtomicU64,
}

impl Notifier {
    pub fn new(capacity: usize, enabled: bool) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            enabled,
            published: AtomicU64::new(0),
            undelivered: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Publish an event, returning how many subscribers it reached
    pub fn publish(&self, event: Notification) -> usize {
        if !self.enabled {
            return 0;
        }

        self.published.fetch_add(1, Ordering::Relaxed);
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                debug!("No subscribers for {} on {}", event.kind(), event.address());
                self.undelivered.fetch_add(1, Ordering::Relaxed);
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Subscription as a stream; lagging yields `Err` items, not termination
    pub fn stream(&self) -> BroadcastStream<Notification> {
        BroadcastStream::new(self.tx.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn stats(&self) -> NotifierStats {
        NotifierStats {
            published: self.published.load(Ordering::Relaxed),
            undelivered: self.undelivered.load(Ordering::Relaxed),
            subscribers: self.subscriber_count(),
        }
    }
}

/// Notifier statistics
#[derive(Debug, Clone)]
pub struct NotifierStats {
    pub published: u64,
    pub undelivered: u64,
    pub subscribers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokenagg_core::{TokenRecord, TokenUpdate};
    use tokio_stream::StreamExt;

    fn update(addr: &str) -> Notification {
        let record = TokenRecord::empty(addr.into(), Utc::now());
        Notification::TokenUpdate(TokenUpdate::from(&record))
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let notifier = Notifier::new(16, true);
        let mut rx = notifier.subscribe();
        let mut stream = notifier.stream();

        assert_eq!(notifier.publish(update("a")), 2);

        assert_eq!(rx.recv().await.unwrap().address().as_str(), "a");
        let from_stream = stream.next().await.unwrap().unwrap();
        assert_eq!(from_stream.kind(), "token_update");
    }

    #[test]
    fn test_publish_without_subscribers_is_not_an_error() {
        let notifier = Notifier::new(16, true);
        assert_eq!(notifier.publish(update("a")), 0);

        let stats = notifier.stats();
        assert_eq!(stats.published, 1);
        assert_eq!(stats.undelivered, 1);
    }

    #[tokio::test]
    async fn test_disabled_notifier_drops_events() {
        let notifier = Notifier::new(16, false);
        let mut rx = notifier.subscribe();

        assert_eq!(notifier.publish(update("a")), 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(notifier.stats().published, 0);
    }
}
