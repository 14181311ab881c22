//! Insert-notification advice.
//!
//! Wraps a store so every committed insert is announced on a change feed,
//! for backends that have no native notification channel.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use super::{PackageDirectory, Result, TrackingStore, UpdateLog};
use crate::model::{NewPackage, Package, RecentUpdate, Update, UpdateDraft};
use crate::sync::{ChangeFeed, InsertNotification, Table};

/// Wrapper that publishes insert notifications after successful writes.
///
/// Notifications are published only after the inner store has committed, so
/// a subscriber re-fetching in response always observes the triggering row.
/// A failed publish is logged and does not fail the write.
///
/// # Example
///
/// ```ignore
/// let feed: Arc<dyn ChangeFeed> = Arc::new(ChannelChangeFeed::default());
/// let store = NotifyingStore::new(SqliteTrackingStore::new(pool), feed.clone());
/// ```
pub struct NotifyingStore<S> {
    inner: S,
    feed: Arc<dyn ChangeFeed>,
}

impl<S> NotifyingStore<S> {
    pub fn new(inner: S, feed: Arc<dyn ChangeFeed>) -> Self {
        Self { inner, feed }
    }

    /// Get a reference to the inner store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn announce(&self, table: Table, key: Uuid) {
        if let Err(e) = self.feed.publish(InsertNotification::new(table, key)).await {
            warn!(%table, %key, error = %e, "Failed to publish insert notification");
        }
    }
}

#[async_trait]
impl<S: PackageDirectory> PackageDirectory for NotifyingStore<S> {
    async fn find_package(&self, package_id: &str) -> Result<Option<Package>> {
        self.inner.find_package(package_id).await
    }

    async fn list_packages(&self) -> Result<Vec<Package>> {
        self.inner.list_packages().await
    }
}

#[async_trait]
impl<S: UpdateLog> UpdateLog for NotifyingStore<S> {
    async fn updates_for(&self, package_key: Uuid) -> Result<Vec<Update>> {
        self.inner.updates_for(package_key).await
    }

    async fn recent_updates(&self, limit: u32) -> Result<Vec<RecentUpdate>> {
        self.inner.recent_updates(limit).await
    }
}

#[async_trait]
impl<S: TrackingStore> TrackingStore for NotifyingStore<S> {
    async fn create_package(
        &self,
        package: NewPackage,
        created_by: &str,
        genesis: UpdateDraft,
    ) -> Result<(Package, Update)> {
        let (package, genesis) = self
            .inner
            .create_package(package, created_by, genesis)
            .await?;

        self.announce(Table::Packages, package.key).await;
        self.announce(Table::PackageUpdates, genesis.key).await;

        Ok((package, genesis))
    }

    async fn append_update(
        &self,
        package_key: Uuid,
        draft: UpdateDraft,
    ) -> Result<(Package, Update)> {
        let (package, update) = self.inner.append_update(package_key, draft).await?;

        self.announce(Table::PackageUpdates, update.key).await;

        Ok((package, update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SealStatus, Stage};
    use crate::storage::{FailPoint, InMemoryTrackingStore};
    use crate::sync::{ChannelChangeFeed, FeedSignal};
    use crate::test_utils::{assert_quiet, manager, new_package, next_signal, RecordingHandler};

    async fn setup() -> (
        NotifyingStore<InMemoryTrackingStore>,
        Arc<ChannelChangeFeed>,
    ) {
        let feed = Arc::new(ChannelChangeFeed::default());
        let store = NotifyingStore::new(InMemoryTrackingStore::new(), feed.clone());
        (store, feed)
    }

    #[tokio::test]
    async fn test_create_announces_package_and_genesis() {
        let (store, feed) = setup().await;
        let (handler, mut packages) = RecordingHandler::new();
        let _packages_sub = feed.subscribe(Table::Packages, handler).await.unwrap();
        let (handler, mut updates) = RecordingHandler::new();
        let _updates_sub = feed.subscribe(Table::PackageUpdates, handler).await.unwrap();

        let (package, genesis) = store
            .create_package(new_package("PKG-1"), "mgr-1", UpdateDraft::genesis(&manager()))
            .await
            .unwrap();

        assert_eq!(
            next_signal(&mut packages).await,
            Some(FeedSignal::Insert(InsertNotification::new(
                Table::Packages,
                package.key
            )))
        );
        assert_eq!(
            next_signal(&mut updates).await,
            Some(FeedSignal::Insert(InsertNotification::new(
                Table::PackageUpdates,
                genesis.key
            )))
        );
    }

    #[tokio::test]
    async fn test_append_announces_update_only() {
        let (store, feed) = setup().await;
        let (package, _) = store
            .create_package(new_package("PKG-1"), "mgr-1", UpdateDraft::genesis(&manager()))
            .await
            .unwrap();

        let (handler, mut packages) = RecordingHandler::new();
        let _packages_sub = feed.subscribe(Table::Packages, handler.clone()).await.unwrap();
        let (handler, mut updates) = RecordingHandler::new();
        let _updates_sub = feed.subscribe(Table::PackageUpdates, handler).await.unwrap();

        let draft = UpdateDraft::transition(Stage::Dispatched, SealStatus::Intact, &manager());
        let (_, update) = store.append_update(package.key, draft).await.unwrap();

        assert_eq!(
            next_signal(&mut updates).await,
            Some(FeedSignal::Insert(InsertNotification::new(
                Table::PackageUpdates,
                update.key
            )))
        );
        assert_quiet(&mut packages).await;
    }

    #[tokio::test]
    async fn test_failed_write_announces_nothing() {
        let (store, feed) = setup().await;
        let (handler, mut packages) = RecordingHandler::new();
        let _sub = feed.subscribe(Table::Packages, handler.clone()).await.unwrap();

        store.inner().fail_at(FailPoint::GenesisInsert).await;
        let result = store
            .create_package(new_package("PKG-1"), "mgr-1", UpdateDraft::genesis(&manager()))
            .await;

        assert!(result.is_err());
        assert_quiet(&mut packages).await;
    }

    #[tokio::test]
    async fn test_closed_feed_does_not_fail_write() {
        let (store, feed) = setup().await;
        feed.close().await;

        let result = store
            .create_package(new_package("PKG-1"), "mgr-1", UpdateDraft::genesis(&manager()))
            .await;

        assert!(result.is_ok());
        assert!(store.find_package("PKG-1").await.unwrap().is_some());
    }
}
