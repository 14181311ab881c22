//! Storage interfaces and implementations.
//!
//! The hosted store is modelled as two logical tables:
//! - `packages`: one mutable row per package (`PackageDirectory`)
//! - `package_updates`: append-only log of transitions (`UpdateLog`)
//!
//! `TrackingStore` adds the two write operations that touch both tables.
//! Each runs as a single transaction: a package is never visible without its
//! genesis update, and a projection is never patched without its log row.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::config::{StorageConfig, StorageType};
use crate::model::{NewPackage, Package, RecentUpdate, Update, UpdateDraft, ValidationError};
use crate::sync::{ChangeFeed, ChannelChangeFeed};

pub mod helpers;
pub mod memory;
pub mod notifying;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod schema;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod sql;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::{FailPoint, InMemoryTrackingStore};
pub use notifying::NotifyingStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteTrackingStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresTrackingStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Package already exists: {0}")]
    DuplicatePackage(String),

    #[error("Package row missing: key={0}")]
    MissingPackage(Uuid),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid stored value: {0}")]
    InvalidValue(#[from] ValidationError),

    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Injected failure: {0}")]
    Injected(String),
}

/// Read access to the package table.
#[async_trait]
pub trait PackageDirectory: Send + Sync {
    /// Look up a package by its human-facing identifier.
    async fn find_package(&self, package_id: &str) -> Result<Option<Package>>;

    /// All packages, newest first.
    async fn list_packages(&self) -> Result<Vec<Package>>;
}

/// Read access to the update log.
#[async_trait]
pub trait UpdateLog: Send + Sync {
    /// Every update for a package in log order (ascending `created_at`).
    async fn updates_for(&self, package_key: Uuid) -> Result<Vec<Update>>;

    /// The `limit` most recent updates across all packages, newest first.
    async fn recent_updates(&self, limit: u32) -> Result<Vec<RecentUpdate>>;
}

/// Atomic writes spanning both tables.
///
/// Implementations:
/// - `InMemoryTrackingStore`: process-local, with failure injection
/// - `SqliteTrackingStore`: SQLite storage
/// - `PostgresTrackingStore`: PostgreSQL storage with NOTIFY triggers
#[async_trait]
pub trait TrackingStore: PackageDirectory + UpdateLog {
    /// Insert a package row together with its genesis update.
    ///
    /// Fails with `DuplicatePackage` when `package_id` is taken; nothing is
    /// written in that case.
    async fn create_package(
        &self,
        package: NewPackage,
        created_by: &str,
        genesis: UpdateDraft,
    ) -> Result<(Package, Update)>;

    /// Append an update and patch the package projection to match it.
    ///
    /// The store assigns the update's sequence and a `created_at` that never
    /// precedes the previous update of the same package.
    async fn append_update(
        &self,
        package_key: Uuid,
        draft: UpdateDraft,
    ) -> Result<(Package, Update)>;
}

/// Initialize storage based on configuration.
///
/// Returns the store together with the change feed that reports its inserts.
/// In-process backends are wrapped in `NotifyingStore` over a channel feed;
/// PostgreSQL emits notifications from triggers and is paired with a
/// LISTEN/NOTIFY feed.
pub async fn init_storage(
    config: &StorageConfig,
    channel_capacity: usize,
) -> std::result::Result<(Arc<dyn TrackingStore>, Arc<dyn ChangeFeed>), Box<dyn std::error::Error>>
{
    match config.storage_type {
        StorageType::Memory => {
            info!(storage_type = "memory", "Storage initialized");
            let feed: Arc<dyn ChangeFeed> = Arc::new(ChannelChangeFeed::new(channel_capacity));
            let store = NotifyingStore::new(InMemoryTrackingStore::new(), Arc::clone(&feed));
            Ok((Arc::new(store), feed))
        }
        StorageType::Sqlite => {
            #[cfg(feature = "sqlite")]
            {
                let path = &config.sqlite.path;
                if let Some(parent) = std::path::Path::new(path).parent() {
                    std::fs::create_dir_all(parent)?;
                }

                let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", path)).await?;
                let store = SqliteTrackingStore::new(pool);
                store.init().await?;

                info!(storage_type = "sqlite", path = %path, "Storage initialized");
                let feed: Arc<dyn ChangeFeed> =
                    Arc::new(ChannelChangeFeed::new(channel_capacity));
                let store = NotifyingStore::new(store, Arc::clone(&feed));
                Ok((Arc::new(store), feed))
            }

            #[cfg(not(feature = "sqlite"))]
            {
                tracing::error!("SQLite storage requested but 'sqlite' feature is not enabled");
                Err("SQLite support requires the 'sqlite' feature".into())
            }
        }
        StorageType::Postgres => {
            #[cfg(feature = "postgres")]
            {
                let pool = sqlx::PgPool::connect(&config.postgres.uri).await?;
                let store = PostgresTrackingStore::new(pool.clone());
                store.init().await?;

                info!(storage_type = "postgres", "Storage initialized");
                let feed = crate::sync::PgNotifyFeed::new(pool);
                Ok((Arc::new(store), Arc::new(feed)))
            }

            #[cfg(not(feature = "postgres"))]
            {
                tracing::error!("PostgreSQL storage requested but 'postgres' feature is not enabled");
                Err("PostgreSQL support requires the 'postgres' feature".into())
            }
        }
    }
}
