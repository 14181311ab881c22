//! Package and update records.
//!
//! A `Package` is one tracked shipment; its `current_stage` and `seal_status`
//! are a projection of the last `Update` appended to its log. Records are
//! validated where they cross the store boundary and are fully typed
//! everywhere downstream.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Input validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Unknown stage: {0:?}")]
    UnknownStage(String),

    #[error("Unknown seal status: {0:?}")]
    UnknownSealStatus(String),
}

/// Position of a package in its delivery lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "Package Created")]
    PackageCreated,
    #[serde(rename = "Dispatched")]
    Dispatched,
    #[serde(rename = "In Transit")]
    InTransit,
    #[serde(rename = "Out for Delivery")]
    OutForDelivery,
    #[serde(rename = "Delivered")]
    Delivered,
    #[serde(rename = "Exception")]
    Exception,
}

impl Stage {
    /// Every stage, in lifecycle order.
    pub const ALL: [Stage; 6] = [
        Stage::PackageCreated,
        Stage::Dispatched,
        Stage::InTransit,
        Stage::OutForDelivery,
        Stage::Delivered,
        Stage::Exception,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::PackageCreated => "Package Created",
            Stage::Dispatched => "Dispatched",
            Stage::InTransit => "In Transit",
            Stage::OutForDelivery => "Out for Delivery",
            Stage::Delivered => "Delivered",
            Stage::Exception => "Exception",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ValidationError;

    /// Case-insensitive, ignores surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownStage(s.to_string()))
    }
}

/// Tamper-evidence indicator for the physical package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SealStatus {
    Intact,
    Broken,
    Replaced,
}

impl SealStatus {
    pub const ALL: [SealStatus; 3] = [SealStatus::Intact, SealStatus::Broken, SealStatus::Replaced];

    pub fn as_str(&self) -> &'static str {
        match self {
            SealStatus::Intact => "Intact",
            SealStatus::Broken => "Broken",
            SealStatus::Replaced => "Replaced",
        }
    }
}

impl fmt::Display for SealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SealStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        SealStatus::ALL
            .into_iter()
            .find(|seal| seal.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownSealStatus(s.to_string()))
    }
}

/// Authenticated actor performing a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub email: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}

/// Name and address of a sender or recipient. Opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub address: String,
}

impl Party {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Creation request for a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPackage {
    /// Creator-chosen identifier, unique across all packages.
    pub package_id: String,
    pub sender: Party,
    pub recipient: Party,
}

impl NewPackage {
    pub fn new(package_id: impl Into<String>, sender: Party, recipient: Party) -> Self {
        Self {
            package_id: package_id.into(),
            sender,
            recipient,
        }
    }

    /// All five fields must be non-blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("package_id", &self.package_id),
            ("sender_name", &self.sender.name),
            ("sender_address", &self.sender.address),
            ("recipient_name", &self.recipient.name),
            ("recipient_address", &self.recipient.address),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field));
            }
        }
        Ok(())
    }
}

/// A tracked shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Internal key. Updates reference this, never `package_id`.
    pub key: Uuid,
    pub package_id: String,
    pub sender: Party,
    pub recipient: Party,
    pub current_stage: Stage,
    pub seal_status: SealStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One lifecycle transition, immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub key: Uuid,
    /// Internal key of the owning package.
    pub package_key: Uuid,
    /// Position in the package's log, starting at 0 for the genesis update.
    pub sequence: u32,
    pub stage: Stage,
    pub seal_status: SealStatus,
    pub updated_by: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl Update {
    pub fn is_genesis(&self) -> bool {
        self.sequence == 0
            && self.stage == Stage::PackageCreated
            && self.seal_status == SealStatus::Intact
    }
}

/// Update content supplied by the engine; the store assigns key, sequence
/// and timestamp inside its write transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDraft {
    pub stage: Stage,
    pub seal_status: SealStatus,
    pub updated_by: String,
    pub notes: String,
}

impl UpdateDraft {
    /// The mandatory first update of every package.
    pub fn genesis(actor: &Actor) -> Self {
        Self {
            stage: Stage::PackageCreated,
            seal_status: SealStatus::Intact,
            updated_by: actor.id.clone(),
            notes: format!("Package created by {}", actor.email),
        }
    }

    pub fn transition(stage: Stage, seal_status: SealStatus, actor: &Actor) -> Self {
        Self {
            stage,
            seal_status,
            updated_by: actor.id.clone(),
            notes: format!("Updated by {}", actor.email),
        }
    }
}

/// An update joined with the human-facing identifier of its package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentUpdate {
    pub package_id: String,
    pub update: Update,
}

/// State snapshot handed to the barcode renderer after an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSnapshot {
    pub package_id: String,
    pub stage: Stage,
    pub seal_status: SealStatus,
    pub timestamp: String,
    pub updated_by: String,
}

impl UpdateSnapshot {
    pub fn new(package_id: &str, update: &Update, actor: &Actor) -> Self {
        Self {
            package_id: package_id.to_string(),
            stage: update.stage,
            seal_status: update.seal_status,
            timestamp: update
                .created_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            updated_by: actor.email.clone(),
        }
    }

    /// JSON payload suitable for a 2D barcode.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Result of a successful `apply_update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedUpdate {
    pub package: Package,
    pub update: Update,
    pub snapshot: UpdateSnapshot,
}

/// One row of the public timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub stage: Stage,
    pub seal_status: SealStatus,
    pub updated_by: String,
    pub notes: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Update> for TimelineEntry {
    fn from(update: &Update) -> Self {
        Self {
            stage: update.stage,
            seal_status: update.seal_status,
            updated_by: update.updated_by.clone(),
            notes: update.notes.clone(),
            timestamp: update.created_at,
        }
    }
}

/// Public tracking view of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingReport {
    pub package_id: String,
    pub status: Stage,
    pub seal_status: SealStatus,
    pub timeline: Vec<TimelineEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_update(sequence: u32, stage: Stage) -> Update {
        Update {
            key: Uuid::new_v4(),
            package_key: Uuid::new_v4(),
            sequence,
            stage,
            seal_status: SealStatus::Intact,
            updated_by: "mgr-1".to_string(),
            notes: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_stage_parse_is_case_insensitive() {
        assert_eq!("out for delivery".parse::<Stage>(), Ok(Stage::OutForDelivery));
        assert_eq!("  IN TRANSIT ".parse::<Stage>(), Ok(Stage::InTransit));
    }

    #[test]
    fn test_stage_parse_rejects_unknown() {
        assert_eq!(
            "Lost".parse::<Stage>(),
            Err(ValidationError::UnknownStage("Lost".to_string()))
        );
        assert!("".parse::<SealStatus>().is_err());
    }

    #[test]
    fn test_stage_serializes_display_string() {
        let json = serde_json::to_string(&Stage::PackageCreated).unwrap();
        assert_eq!(json, "\"Package Created\"");
        let seal: SealStatus = serde_json::from_str("\"Broken\"").unwrap();
        assert_eq!(seal, SealStatus::Broken);
    }

    #[test]
    fn test_new_package_requires_every_field() {
        let ok = NewPackage::new(
            "PKG-1",
            Party::new("Alice", "1 Main St"),
            Party::new("Bob", "2 Oak St"),
        );
        assert!(ok.validate().is_ok());

        let mut blank_address = ok.clone();
        blank_address.recipient.address = "   ".to_string();
        assert_eq!(
            blank_address.validate(),
            Err(ValidationError::MissingField("recipient_address"))
        );

        let mut no_id = ok;
        no_id.package_id.clear();
        assert_eq!(no_id.validate(), Err(ValidationError::MissingField("package_id")));
    }

    #[test]
    fn test_genesis_draft_notes() {
        let actor = Actor::new("u-1", "ops@example.com");
        let draft = UpdateDraft::genesis(&actor);
        assert_eq!(draft.stage, Stage::PackageCreated);
        assert_eq!(draft.seal_status, SealStatus::Intact);
        assert_eq!(draft.updated_by, "u-1");
        assert_eq!(draft.notes, "Package created by ops@example.com");
    }

    #[test]
    fn test_is_genesis() {
        assert!(sample_update(0, Stage::PackageCreated).is_genesis());
        assert!(!sample_update(1, Stage::PackageCreated).is_genesis());
        assert!(!sample_update(0, Stage::Dispatched).is_genesis());
    }

    #[test]
    fn test_snapshot_payload_uses_camel_case() {
        let actor = Actor::new("u-1", "ops@example.com");
        let update = sample_update(2, Stage::Delivered);
        let payload = UpdateSnapshot::new("PKG-9", &update, &actor)
            .to_payload()
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["packageId"], "PKG-9");
        assert_eq!(value["stage"], "Delivered");
        assert_eq!(value["sealStatus"], "Intact");
        assert_eq!(value["updatedBy"], "ops@example.com");
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}
