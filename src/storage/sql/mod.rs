//! Shared SQL building blocks for the PostgreSQL and SQLite backends.
//!
//! Statements are built once with sea-query and rendered by each backend
//! with its own query builder; rows decode through `sqlx::FromRow` into
//! backend-neutral structs and are validated on the way out.

use sea_query::{Alias, Expr, InsertStatement, Order, Query, SelectStatement, UpdateStatement};
use uuid::Uuid;

use super::helpers::{format_timestamp, parse_timestamp};
use super::schema::{PackageUpdates, Packages};
use super::{Result, StorageError};
use crate::model::{Package, Party, RecentUpdate, Update};

const PACKAGE_COLUMNS: [Packages; 11] = [
    Packages::Id,
    Packages::PackageId,
    Packages::SenderName,
    Packages::SenderAddress,
    Packages::RecipientName,
    Packages::RecipientAddress,
    Packages::CurrentStage,
    Packages::SealStatus,
    Packages::CreatedBy,
    Packages::CreatedAt,
    Packages::UpdatedAt,
];

const UPDATE_COLUMNS: [PackageUpdates; 8] = [
    PackageUpdates::Id,
    PackageUpdates::PackageId,
    PackageUpdates::Sequence,
    PackageUpdates::Stage,
    PackageUpdates::SealStatus,
    PackageUpdates::UpdatedBy,
    PackageUpdates::Notes,
    PackageUpdates::CreatedAt,
];

/// Alias for the joined tracking identifier in the recent-updates query.
const TRACKING_ID: &str = "tracking_id";

pub fn select_package_by_id(package_id: &str) -> SelectStatement {
    Query::select()
        .columns(PACKAGE_COLUMNS)
        .from(Packages::Table)
        .and_where(Expr::col(Packages::PackageId).eq(package_id))
        .to_owned()
}

pub fn select_package_by_key(key: Uuid) -> SelectStatement {
    Query::select()
        .columns(PACKAGE_COLUMNS)
        .from(Packages::Table)
        .and_where(Expr::col(Packages::Id).eq(key.to_string()))
        .to_owned()
}

pub fn select_packages() -> SelectStatement {
    Query::select()
        .columns(PACKAGE_COLUMNS)
        .from(Packages::Table)
        .order_by(Packages::CreatedAt, Order::Desc)
        .to_owned()
}

pub fn select_updates_for(package_key: Uuid) -> SelectStatement {
    Query::select()
        .columns(UPDATE_COLUMNS)
        .from(PackageUpdates::Table)
        .and_where(Expr::col(PackageUpdates::PackageId).eq(package_key.to_string()))
        .order_by(PackageUpdates::CreatedAt, Order::Asc)
        .order_by(PackageUpdates::Sequence, Order::Asc)
        .to_owned()
}

pub fn select_recent_updates(limit: u32) -> SelectStatement {
    Query::select()
        .columns(UPDATE_COLUMNS.map(|c| (PackageUpdates::Table, c)))
        .expr_as(
            Expr::col((Packages::Table, Packages::PackageId)),
            Alias::new(TRACKING_ID),
        )
        .from(PackageUpdates::Table)
        .inner_join(
            Packages::Table,
            Expr::col((PackageUpdates::Table, PackageUpdates::PackageId))
                .equals((Packages::Table, Packages::Id)),
        )
        .order_by((PackageUpdates::Table, PackageUpdates::CreatedAt), Order::Desc)
        .order_by((PackageUpdates::Table, PackageUpdates::Sequence), Order::Desc)
        .limit(u64::from(limit))
        .to_owned()
}

/// Highest sequence and latest timestamp in a package's log.
pub fn select_log_tail(package_key: Uuid) -> SelectStatement {
    Query::select()
        .expr_as(
            Expr::col(PackageUpdates::Sequence).max(),
            Alias::new("max_sequence"),
        )
        .expr_as(
            Expr::col(PackageUpdates::CreatedAt).max(),
            Alias::new("max_created_at"),
        )
        .from(PackageUpdates::Table)
        .and_where(Expr::col(PackageUpdates::PackageId).eq(package_key.to_string()))
        .to_owned()
}

pub fn insert_package(package: &Package) -> InsertStatement {
    Query::insert()
        .into_table(Packages::Table)
        .columns(PACKAGE_COLUMNS)
        .values_panic([
            package.key.to_string().into(),
            package.package_id.clone().into(),
            package.sender.name.clone().into(),
            package.sender.address.clone().into(),
            package.recipient.name.clone().into(),
            package.recipient.address.clone().into(),
            package.current_stage.as_str().into(),
            package.seal_status.as_str().into(),
            package.created_by.clone().into(),
            format_timestamp(&package.created_at).into(),
            format_timestamp(&package.updated_at).into(),
        ])
        .to_owned()
}

pub fn insert_update(update: &Update) -> InsertStatement {
    Query::insert()
        .into_table(PackageUpdates::Table)
        .columns(UPDATE_COLUMNS)
        .values_panic([
            update.key.to_string().into(),
            update.package_key.to_string().into(),
            i64::from(update.sequence).into(),
            update.stage.as_str().into(),
            update.seal_status.as_str().into(),
            update.updated_by.clone().into(),
            update.notes.clone().into(),
            format_timestamp(&update.created_at).into(),
        ])
        .to_owned()
}

/// Patch the projection columns to mirror `update`.
pub fn update_projection(update: &Update) -> UpdateStatement {
    Query::update()
        .table(Packages::Table)
        .values([
            (Packages::CurrentStage, update.stage.as_str().into()),
            (Packages::SealStatus, update.seal_status.as_str().into()),
            (
                Packages::UpdatedAt,
                format_timestamp(&update.created_at).into(),
            ),
        ])
        .and_where(Expr::col(Packages::Id).eq(update.package_key.to_string()))
        .to_owned()
}

/// Raw `packages` row.
#[derive(Debug, sqlx::FromRow)]
pub struct PackageRow {
    pub id: String,
    pub package_id: String,
    pub sender_name: String,
    pub sender_address: String,
    pub recipient_name: String,
    pub recipient_address: String,
    pub current_stage: String,
    pub seal_status: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<PackageRow> for Package {
    type Error = StorageError;

    fn try_from(row: PackageRow) -> Result<Self> {
        Ok(Package {
            key: Uuid::parse_str(&row.id)?,
            package_id: row.package_id,
            sender: Party::new(row.sender_name, row.sender_address),
            recipient: Party::new(row.recipient_name, row.recipient_address),
            current_stage: row.current_stage.parse()?,
            seal_status: row.seal_status.parse()?,
            created_by: row.created_by,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

/// Raw `package_updates` row.
#[derive(Debug, sqlx::FromRow)]
pub struct UpdateRow {
    pub id: String,
    pub package_id: String,
    pub sequence: i64,
    pub stage: String,
    pub seal_status: String,
    pub updated_by: String,
    pub notes: String,
    pub created_at: String,
}

impl TryFrom<UpdateRow> for Update {
    type Error = StorageError;

    fn try_from(row: UpdateRow) -> Result<Self> {
        Ok(Update {
            key: Uuid::parse_str(&row.id)?,
            package_key: Uuid::parse_str(&row.package_id)?,
            sequence: row.sequence as u32,
            stage: row.stage.parse()?,
            seal_status: row.seal_status.parse()?,
            updated_by: row.updated_by,
            notes: row.notes,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

/// Update row joined with its package's tracking identifier.
#[derive(Debug, sqlx::FromRow)]
pub struct RecentUpdateRow {
    pub tracking_id: String,
    #[sqlx(flatten)]
    pub update: UpdateRow,
}

impl TryFrom<RecentUpdateRow> for RecentUpdate {
    type Error = StorageError;

    fn try_from(row: RecentUpdateRow) -> Result<Self> {
        Ok(RecentUpdate {
            package_id: row.tracking_id,
            update: row.update.try_into()?,
        })
    }
}

/// Aggregate over one package's log.
#[derive(Debug, sqlx::FromRow)]
pub struct LogTailRow {
    pub max_sequence: Option<i64>,
    pub max_created_at: Option<String>,
}

impl LogTailRow {
    pub fn last_created_at(&self) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        self.max_created_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
    }
}

/// Decode a batch of rows, failing on the first invalid one.
pub fn decode_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = StorageError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Map a unique-constraint violation on insert to `DuplicatePackage`.
pub fn map_insert_error(err: sqlx::Error, package_id: &str) -> StorageError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StorageError::DuplicatePackage(package_id.to_string())
        }
        _ => StorageError::Database(err),
    }
}
