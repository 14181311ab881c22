//! Mountable dashboard view.
//!
//! Holds the package list and the N most recent updates. Any insert on
//! either table triggers a wholesale re-fetch of both; nothing is merged
//! incrementally. Mounting subscribes to both tables and unmounting (or
//! dropping the handle) releases them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use super::{ChangeFeed, FeedError, FeedSignal, InsertHandler, Subscription, Table};
use crate::error::LifecycleError;
use crate::lifecycle::LifecycleEngine;
use crate::model::{Package, RecentUpdate};

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("Initial fetch failed: {0}")]
    Fetch(#[from] LifecycleError),

    #[error("Subscribe failed: {0}")]
    Subscribe(#[from] FeedError),
}

/// Point-in-time dashboard state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardSnapshot {
    /// All packages, newest first.
    pub packages: Vec<Package>,
    /// Most recent updates across all packages, newest first.
    pub recent_updates: Vec<RecentUpdate>,
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Set once the change feed has closed. The data is still served but
    /// will no longer follow the store.
    pub stale: bool,
    /// Number of completed refreshes.
    pub generation: u64,
}

/// Dashboard definition. Call [`mount`](Self::mount) to start it.
pub struct DashboardView {
    engine: LifecycleEngine,
    feed: Arc<dyn ChangeFeed>,
    recent_limit: u32,
}

impl DashboardView {
    pub fn new(engine: LifecycleEngine, feed: Arc<dyn ChangeFeed>, recent_limit: u32) -> Self {
        Self {
            engine,
            feed,
            recent_limit,
        }
    }

    /// Subscribe to both tables and load the initial snapshot.
    pub async fn mount(&self) -> Result<MountedDashboard, DashboardError> {
        let (state, changes) = watch::channel(DashboardSnapshot::default());
        let refresher = Arc::new(Refresher {
            engine: self.engine.clone(),
            recent_limit: self.recent_limit,
            state,
            gate: Mutex::new(()),
        });

        // Subscribe before the first fetch so an insert landing in between
        // still triggers a refresh.
        let handler: Arc<dyn InsertHandler> = Arc::new(RefreshOnSignal(refresher.clone()));
        let mut subscriptions = Vec::with_capacity(2);
        for table in [Table::Packages, Table::PackageUpdates] {
            subscriptions.push(self.feed.subscribe(table, handler.clone()).await?);
        }

        refresher.refresh().await?;

        info!(recent_limit = self.recent_limit, "Dashboard mounted");

        Ok(MountedDashboard {
            refresher,
            subscriptions,
            changes,
        })
    }
}

/// A live dashboard. Dropping it releases its subscriptions.
pub struct MountedDashboard {
    refresher: Arc<Refresher>,
    subscriptions: Vec<Subscription>,
    changes: watch::Receiver<DashboardSnapshot>,
}

impl MountedDashboard {
    /// Latest snapshot.
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.changes.borrow().clone()
    }

    /// Receiver that wakes on every new snapshot.
    pub fn changes(&self) -> watch::Receiver<DashboardSnapshot> {
        self.changes.clone()
    }

    /// Re-fetch now, outside the notification path.
    pub async fn refresh(&self) -> Result<(), LifecycleError> {
        self.refresher.refresh().await
    }

    /// Whether every subscription is still delivering.
    pub fn is_live(&self) -> bool {
        self.subscriptions.iter().all(Subscription::is_active)
    }

    /// Release both subscriptions.
    pub fn unmount(self) {
        for subscription in self.subscriptions {
            subscription.release();
        }
        info!("Dashboard unmounted");
    }
}

struct Refresher {
    engine: LifecycleEngine,
    recent_limit: u32,
    state: watch::Sender<DashboardSnapshot>,
    /// Serializes refreshes so a slower, older fetch cannot overwrite a newer one.
    gate: Mutex<()>,
}

impl Refresher {
    async fn refresh(&self) -> Result<(), LifecycleError> {
        let _guard = self.gate.lock().await;

        let (packages, recent_updates) = tokio::try_join!(
            self.engine.list_packages(),
            self.engine.recent_updates(self.recent_limit),
        )?;

        self.state.send_modify(|snapshot| {
            snapshot.packages = packages;
            snapshot.recent_updates = recent_updates;
            snapshot.refreshed_at = Some(Utc::now());
            snapshot.generation += 1;
        });

        debug!(generation = self.state.borrow().generation, "Dashboard refreshed");
        Ok(())
    }

    fn mark_stale(&self) {
        self.state.send_if_modified(|snapshot| {
            let changed = !snapshot.stale;
            snapshot.stale = true;
            changed
        });
    }
}

struct RefreshOnSignal(Arc<Refresher>);

impl InsertHandler for RefreshOnSignal {
    fn on_signal(&self, signal: FeedSignal) -> BoxFuture<'static, ()> {
        let refresher = self.0.clone();
        Box::pin(async move {
            match signal {
                FeedSignal::Insert(notification) => {
                    debug!(
                        table = %notification.table,
                        key = %notification.key,
                        "Insert observed, refreshing dashboard"
                    );
                }
                FeedSignal::Lagged(missed) => {
                    warn!(missed, "Dashboard missed notifications, refreshing");
                }
                FeedSignal::Closed => {
                    warn!("Change feed closed, dashboard will go stale");
                    refresher.mark_stale();
                    return;
                }
            }

            // A failed refresh keeps the previous snapshot.
            if let Err(e) = refresher.refresh().await {
                error!(error = %e, "Dashboard refresh failed");
            }
        })
    }
}
