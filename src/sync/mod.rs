//! Live sync layer.
//!
//! A [`ChangeFeed`] reports committed inserts on the two logical tables.
//! Views subscribe per table and receive a [`Subscription`] handle; the
//! subscription lives exactly as long as that handle.
//!
//! Implementations:
//! - `ChannelChangeFeed`: in-process tokio broadcast channel
//! - `PgNotifyFeed`: PostgreSQL LISTEN/NOTIFY (feature `postgres`)

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

pub mod channel;
pub mod dashboard;
#[cfg(feature = "postgres")]
pub mod pg_notify;

pub use channel::ChannelChangeFeed;
pub use dashboard::{DashboardError, DashboardSnapshot, DashboardView, MountedDashboard};
#[cfg(feature = "postgres")]
pub use pg_notify::PgNotifyFeed;

/// Result type for change feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Errors that can occur on a change feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Feed closed")]
    Closed,

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Invalid notification payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Logical table watched for inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Packages,
    PackageUpdates,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Packages => "packages",
            Table::PackageUpdates => "package_updates",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed insert: which table, and the inserted row's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertNotification {
    pub table: Table,
    pub key: Uuid,
}

impl InsertNotification {
    pub fn new(table: Table, key: Uuid) -> Self {
        Self { table, key }
    }
}

/// What a subscriber is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSignal {
    /// An insert on the subscribed table.
    Insert(InsertNotification),
    /// Notifications were dropped; the subscriber missed `n` of them (0 when
    /// the transport cannot tell how many).
    Lagged(u64),
    /// The feed is gone. No further signals follow.
    Closed,
}

/// Receiver of feed signals for one subscription.
///
/// Signals for a subscription are delivered one at a time; the next is not
/// delivered until the returned future completes.
pub trait InsertHandler: Send + Sync {
    fn on_signal(&self, signal: FeedSignal) -> BoxFuture<'static, ()>;
}

/// Insert-notification channel for the two logical tables.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Announce a committed insert to every subscriber of its table.
    async fn publish(&self, notification: InsertNotification) -> Result<()>;

    /// Deliver signals for `table` to `handler` until the returned handle is
    /// released or dropped.
    async fn subscribe(
        &self,
        table: Table,
        handler: std::sync::Arc<dyn InsertHandler>,
    ) -> Result<Subscription>;
}

/// Scoped subscription handle. Releasing or dropping it stops delivery.
#[derive(Debug)]
pub struct Subscription {
    table: Table,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn new(table: Table, task: JoinHandle<()>) -> Self {
        Self {
            table,
            task: Some(task),
        }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    /// Whether the delivery task is still running.
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop delivery now.
    pub fn release(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(table = %self.table, "Subscription released");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_match_schema() {
        assert_eq!(Table::Packages.as_str(), "packages");
        assert_eq!(Table::PackageUpdates.to_string(), "package_updates");
    }

    #[test]
    fn test_notification_payload_shape() {
        let key = Uuid::new_v4();
        let json = format!(r#"{{"table":"package_updates","key":"{key}"}}"#);
        let parsed: InsertNotification = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, InsertNotification::new(Table::PackageUpdates, key));
    }

    #[tokio::test]
    async fn test_release_aborts_task() {
        let task = tokio::spawn(futures::future::pending::<()>());
        let subscription = Subscription::new(Table::Packages, task);
        assert!(subscription.is_active());
        subscription.release();
    }

    #[tokio::test]
    async fn test_drop_aborts_task() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _tx = tx;
            futures::future::pending::<()>().await;
        });
        drop(Subscription::new(Table::Packages, task));
        // Abort drops the task's future, which drops the sender.
        assert!(rx.await.is_err());
    }
}
