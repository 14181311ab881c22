//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.
//! Keys and timestamps are stored as text: UUIDs in hyphenated form and
//! timestamps as fixed-width RFC3339, so ordering by `created_at` is a plain
//! string comparison on both backends.

use sea_query::Iden;

/// Packages table schema.
#[derive(Iden)]
pub enum Packages {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "package_id"]
    PackageId,
    #[iden = "sender_name"]
    SenderName,
    #[iden = "sender_address"]
    SenderAddress,
    #[iden = "recipient_name"]
    RecipientName,
    #[iden = "recipient_address"]
    RecipientAddress,
    #[iden = "current_stage"]
    CurrentStage,
    #[iden = "seal_status"]
    SealStatus,
    #[iden = "created_by"]
    CreatedBy,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Package updates table schema.
#[derive(Iden)]
pub enum PackageUpdates {
    Table,
    #[iden = "id"]
    Id,
    /// Foreign key to `packages.id` (the internal key, not the tracking id).
    #[iden = "package_id"]
    PackageId,
    #[iden = "sequence"]
    Sequence,
    #[iden = "stage"]
    Stage,
    #[iden = "seal_status"]
    SealStatus,
    #[iden = "updated_by"]
    UpdatedBy,
    #[iden = "notes"]
    Notes,
    #[iden = "created_at"]
    CreatedAt,
}

/// SQLite DDL.
pub const SQLITE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS packages (
    id TEXT PRIMARY KEY,
    package_id TEXT NOT NULL UNIQUE,
    sender_name TEXT NOT NULL,
    sender_address TEXT NOT NULL,
    recipient_name TEXT NOT NULL,
    recipient_address TEXT NOT NULL,
    current_stage TEXT NOT NULL,
    seal_status TEXT NOT NULL,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS package_updates (
    id TEXT PRIMARY KEY,
    package_id TEXT NOT NULL REFERENCES packages(id),
    sequence INTEGER NOT NULL,
    stage TEXT NOT NULL,
    seal_status TEXT NOT NULL,
    updated_by TEXT NOT NULL,
    notes TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (package_id, sequence)
);

CREATE INDEX IF NOT EXISTS idx_packages_created_at ON packages(created_at);
CREATE INDEX IF NOT EXISTS idx_package_updates_created_at ON package_updates(created_at);
"#;

/// Channel used by the PostgreSQL insert triggers.
pub const NOTIFY_CHANNEL: &str = "sealtrack_inserts";

/// PostgreSQL DDL, including the triggers that publish every insert on
/// `NOTIFY_CHANNEL` as `{"table": ..., "key": ...}`. Notifications are
/// delivered when the inserting transaction commits.
pub const POSTGRES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS packages (
    id TEXT PRIMARY KEY,
    package_id TEXT NOT NULL UNIQUE,
    sender_name TEXT NOT NULL,
    sender_address TEXT NOT NULL,
    recipient_name TEXT NOT NULL,
    recipient_address TEXT NOT NULL,
    current_stage TEXT NOT NULL,
    seal_status TEXT NOT NULL,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS package_updates (
    id TEXT PRIMARY KEY,
    package_id TEXT NOT NULL REFERENCES packages(id),
    sequence BIGINT NOT NULL,
    stage TEXT NOT NULL,
    seal_status TEXT NOT NULL,
    updated_by TEXT NOT NULL,
    notes TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (package_id, sequence)
);

CREATE INDEX IF NOT EXISTS idx_packages_created_at ON packages(created_at);
CREATE INDEX IF NOT EXISTS idx_package_updates_created_at ON package_updates(created_at);

CREATE OR REPLACE FUNCTION sealtrack_notify_insert() RETURNS trigger AS $$
BEGIN
    PERFORM pg_notify(
        'sealtrack_inserts',
        json_build_object('table', TG_TABLE_NAME, 'key', NEW.id)::text
    );
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS packages_notify_insert ON packages;
CREATE TRIGGER packages_notify_insert
    AFTER INSERT ON packages
    FOR EACH ROW EXECUTE FUNCTION sealtrack_notify_insert();

DROP TRIGGER IF EXISTS package_updates_notify_insert ON package_updates;
CREATE TRIGGER package_updates_notify_insert
    AFTER INSERT ON package_updates
    FOR EACH ROW EXECUTE FUNCTION sealtrack_notify_insert();
"#;
