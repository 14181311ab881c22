//! In-memory channel-based change feed.
//!
//! Uses a tokio broadcast channel for pub/sub within a single process.
//! Table filtering is done on the subscriber side.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use super::{
    ChangeFeed, FeedError, FeedSignal, InsertHandler, InsertNotification, Result, Subscription,
    Table,
};

/// Default broadcast capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// In-process change feed using a tokio broadcast channel.
///
/// Every subscriber gets its own receiver. A subscriber that falls more than
/// `capacity` notifications behind is told it lagged.
pub struct ChannelChangeFeed {
    /// Broadcast sender; `None` once the feed is closed.
    sender: RwLock<Option<broadcast::Sender<InsertNotification>>>,
}

impl ChannelChangeFeed {
    /// Create a new channel feed.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        info!(capacity, "Channel change feed initialized");

        Self {
            sender: RwLock::new(Some(sender)),
        }
    }

    /// Close the feed. Subscribers receive `FeedSignal::Closed` and later
    /// publishes fail with `FeedError::Closed`.
    pub async fn close(&self) {
        if self.sender.write().await.take().is_some() {
            info!("Channel change feed closed");
        }
    }

    /// Number of live subscriber receivers.
    pub async fn receiver_count(&self) -> usize {
        self.sender
            .read()
            .await
            .as_ref()
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for ChannelChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[async_trait]
impl ChangeFeed for ChannelChangeFeed {
    #[tracing::instrument(name = "feed.publish", skip_all, fields(table = %notification.table))]
    async fn publish(&self, notification: InsertNotification) -> Result<()> {
        let guard = self.sender.read().await;
        let sender = guard.as_ref().ok_or(FeedError::Closed)?;

        // Send to channel (ignore error if no receivers)
        match sender.send(notification) {
            Ok(receivers) => {
                debug!(key = %notification.key, receivers, "Published insert notification");
            }
            Err(_) => {
                debug!(key = %notification.key, "Published insert notification (no receivers)");
            }
        }
        Ok(())
    }

    async fn subscribe(&self, table: Table, handler: Arc<dyn InsertHandler>) -> Result<Subscription> {
        let mut receiver = self
            .sender
            .read()
            .await
            .as_ref()
            .ok_or(FeedError::Closed)?
            .subscribe();

        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(notification) => {
                        if notification.table != table {
                            continue;
                        }
                        handler.on_signal(FeedSignal::Insert(notification)).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%table, skipped, "Change feed subscriber lagged");
                        handler.on_signal(FeedSignal::Lagged(skipped)).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!(%table, "Channel closed, stopping subscriber");
                        handler.on_signal(FeedSignal::Closed).await;
                        break;
                    }
                }
            }
        });

        info!(%table, "Subscribed to channel change feed");

        Ok(Subscription::new(table, task))
    }
}
