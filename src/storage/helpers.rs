//! Shared storage helper functions.
//!
//! Timestamp formatting and log-position logic used across storage backend
//! implementations.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use uuid::Uuid;

use super::{Result, StorageError};
use crate::model::{NewPackage, Package, Update, UpdateDraft};

/// Timestamp for a new update.
///
/// Truncated to microseconds so it survives a round trip through the
/// text columns unchanged, and clamped so it never precedes `floor` (the
/// previous update of the same package).
pub fn next_timestamp(floor: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(6);
    match floor {
        Some(previous) if previous > now => previous,
        _ => now,
    }
}

/// Fixed-width RFC3339 (microseconds, `Z` suffix). Lexicographic order of the
/// formatted strings matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored RFC3339 timestamp.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidTimestamp(format!("{value}: {e}")))
}

/// Sequence for the next update given the current maximum, if any.
pub fn next_sequence(max_sequence: Option<i64>) -> u32 {
    max_sequence.map(|s| s as u32 + 1).unwrap_or(0)
}

/// Materialize an update row from its draft.
pub fn update_from_draft(
    package_key: Uuid,
    sequence: u32,
    draft: UpdateDraft,
    created_at: DateTime<Utc>,
) -> Update {
    Update {
        key: Uuid::new_v4(),
        package_key,
        sequence,
        stage: draft.stage,
        seal_status: draft.seal_status,
        updated_by: draft.updated_by,
        notes: draft.notes,
        created_at,
    }
}

/// Package row and genesis update sharing one key and timestamp. The
/// projection starts out equal to the genesis update.
pub fn genesis_rows(
    package: NewPackage,
    created_by: &str,
    genesis: UpdateDraft,
    created_at: DateTime<Utc>,
) -> (Package, Update) {
    let key = Uuid::new_v4();
    let row = Package {
        key,
        package_id: package.package_id,
        sender: package.sender,
        recipient: package.recipient,
        current_stage: genesis.stage,
        seal_status: genesis.seal_status,
        created_by: created_by.to_string(),
        created_at,
        updated_at: created_at,
    };
    (row, update_from_draft(key, 0, genesis, created_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_next_timestamp_clamps_to_floor() {
        let future = Utc::now() + Duration::seconds(30);
        assert_eq!(next_timestamp(Some(future)), future);
    }

    #[test]
    fn test_next_timestamp_without_floor_is_now() {
        let before = Utc::now() - Duration::seconds(1);
        assert!(next_timestamp(None) > before);
    }

    #[test]
    fn test_format_then_parse_preserves_instant() {
        let ts = next_timestamp(None);
        let text = format_timestamp(&ts);
        assert!(text.ends_with('Z'));
        assert_eq!(parse_timestamp(&text).unwrap(), ts);
    }

    #[test]
    fn test_formatted_timestamps_sort_chronologically() {
        let early = parse_timestamp("2024-01-15T08:00:00Z").unwrap();
        let late = early + Duration::milliseconds(1500);
        assert!(format_timestamp(&early) < format_timestamp(&late));
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(StorageError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_next_sequence() {
        assert_eq!(next_sequence(None), 0);
        assert_eq!(next_sequence(Some(0)), 1);
        assert_eq!(next_sequence(Some(41)), 42);
    }
}
