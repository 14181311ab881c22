//! SQLite TrackingStore implementation.

use async_trait::async_trait;
use sea_query::SqliteQueryBuilder;
use sea_query_binder::SqlxBinder;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use uuid::Uuid;

use super::helpers::{genesis_rows, next_sequence, next_timestamp, update_from_draft};
use super::schema::SQLITE_SCHEMA;
use super::sql::{self, LogTailRow, PackageRow, RecentUpdateRow, UpdateRow};
use super::{PackageDirectory, Result, StorageError, TrackingStore, UpdateLog};
use crate::model::{NewPackage, Package, RecentUpdate, Update, UpdateDraft};

/// SQLite implementation of TrackingStore.
pub struct SqliteTrackingStore {
    pool: SqlitePool,
}

impl SqliteTrackingStore {
    /// Create a new SQLite tracking store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they do not exist.
    pub async fn init(&self) -> Result<()> {
        sqlx::raw_sql(SQLITE_SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Start a write transaction.
    ///
    /// BEGIN IMMEDIATE acquires the write lock upfront, preventing deadlocks
    /// when concurrent DEFERRED transactions race to upgrade from shared to exclusive.
    /// Dropping the transaction before commit rolls it back.
    async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    async fn insert_package_with_genesis(
        conn: &mut SqliteConnection,
        package: Package,
        genesis: Update,
    ) -> Result<(Package, Update)> {
        let (query, values) = sql::insert_package(&package).build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&query, values)
            .execute(&mut *conn)
            .await
            .map_err(|e| sql::map_insert_error(e, &package.package_id))?;

        let (query, values) = sql::insert_update(&genesis).build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&query, values).execute(&mut *conn).await?;

        Ok((package, genesis))
    }

    async fn append_in_tx(
        conn: &mut SqliteConnection,
        package_key: Uuid,
        draft: UpdateDraft,
    ) -> Result<(Package, Update)> {
        let (query, values) = sql::select_package_by_key(package_key).build_sqlx(SqliteQueryBuilder);
        let row: Option<PackageRow> = sqlx::query_as_with(&query, values)
            .fetch_optional(&mut *conn)
            .await?;
        let mut package: Package = row
            .ok_or(StorageError::MissingPackage(package_key))?
            .try_into()?;

        let (query, values) = sql::select_log_tail(package_key).build_sqlx(SqliteQueryBuilder);
        let tail: LogTailRow = sqlx::query_as_with(&query, values)
            .fetch_one(&mut *conn)
            .await?;

        let update = update_from_draft(
            package_key,
            next_sequence(tail.max_sequence),
            draft,
            next_timestamp(tail.last_created_at()?),
        );

        let (query, values) = sql::insert_update(&update).build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&query, values).execute(&mut *conn).await?;

        let (query, values) = sql::update_projection(&update).build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&query, values).execute(&mut *conn).await?;

        package.current_stage = update.stage;
        package.seal_status = update.seal_status;
        package.updated_at = update.created_at;

        Ok((package, update))
    }
}

#[async_trait]
impl PackageDirectory for SqliteTrackingStore {
    async fn find_package(&self, package_id: &str) -> Result<Option<Package>> {
        let (query, values) = sql::select_package_by_id(package_id).build_sqlx(SqliteQueryBuilder);
        let row: Option<PackageRow> = sqlx::query_as_with(&query, values)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Package::try_from).transpose()
    }

    async fn list_packages(&self) -> Result<Vec<Package>> {
        let (query, values) = sql::select_packages().build_sqlx(SqliteQueryBuilder);
        let rows: Vec<PackageRow> = sqlx::query_as_with(&query, values)
            .fetch_all(&self.pool)
            .await?;
        sql::decode_all(rows)
    }
}

#[async_trait]
impl UpdateLog for SqliteTrackingStore {
    async fn updates_for(&self, package_key: Uuid) -> Result<Vec<Update>> {
        let (query, values) = sql::select_updates_for(package_key).build_sqlx(SqliteQueryBuilder);
        let rows: Vec<UpdateRow> = sqlx::query_as_with(&query, values)
            .fetch_all(&self.pool)
            .await?;
        sql::decode_all(rows)
    }

    async fn recent_updates(&self, limit: u32) -> Result<Vec<RecentUpdate>> {
        let (query, values) = sql::select_recent_updates(limit).build_sqlx(SqliteQueryBuilder);
        let rows: Vec<RecentUpdateRow> = sqlx::query_as_with(&query, values)
            .fetch_all(&self.pool)
            .await?;
        sql::decode_all(rows)
    }
}

#[async_trait]
impl TrackingStore for SqliteTrackingStore {
    async fn create_package(
        &self,
        package: NewPackage,
        created_by: &str,
        genesis: UpdateDraft,
    ) -> Result<(Package, Update)> {
        let (row, genesis) = genesis_rows(package, created_by, genesis, next_timestamp(None));

        let mut tx = self.begin().await?;
        let created = Self::insert_package_with_genesis(&mut *tx, row, genesis).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn append_update(
        &self,
        package_key: Uuid,
        draft: UpdateDraft,
    ) -> Result<(Package, Update)> {
        let mut tx = self.begin().await?;
        let appended = Self::append_in_tx(&mut *tx, package_key, draft).await?;
        tx.commit().await?;
        Ok(appended)
    }
}
