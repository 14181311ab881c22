//! Projection of a package's update log.
//!
//! The projection is the last-write fold of the log: whatever the most
//! recent update says. Order is `(created_at, sequence)`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Package, SealStatus, Stage, Update};

/// Current state derived from a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    pub stage: Stage,
    pub seal_status: SealStatus,
    pub updated_at: DateTime<Utc>,
}

/// Fold a log into its projection. `None` for an empty log.
pub fn project(updates: &[Update]) -> Option<Projection> {
    updates
        .iter()
        .max_by_key(|u| (u.created_at, u.sequence))
        .map(|last| Projection {
            stage: last.stage,
            seal_status: last.seal_status,
            updated_at: last.created_at,
        })
}

/// Inconsistency between a package row and its log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "finding", rename_all = "snake_case")]
pub enum AuditFinding {
    /// The package has no updates at all.
    MissingHistory,
    /// The first update is not a `Package Created` / `Intact` genesis.
    GenesisMismatch {
        stage: Stage,
        seal_status: SealStatus,
    },
    /// Stored projection disagrees with the log.
    ProjectionDrift {
        stored_stage: Stage,
        stored_seal_status: SealStatus,
        derived_stage: Stage,
        derived_seal_status: SealStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub package_id: String,
    pub update_count: usize,
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Check a package row against its ordered log.
pub fn audit(package: &Package, updates: &[Update]) -> AuditReport {
    let mut findings = Vec::new();

    match updates.iter().min_by_key(|u| (u.created_at, u.sequence)) {
        None => findings.push(AuditFinding::MissingHistory),
        Some(first) if !first.is_genesis() => findings.push(AuditFinding::GenesisMismatch {
            stage: first.stage,
            seal_status: first.seal_status,
        }),
        Some(_) => {}
    }

    if let Some(derived) = project(updates) {
        if derived.stage != package.current_stage || derived.seal_status != package.seal_status {
            findings.push(AuditFinding::ProjectionDrift {
                stored_stage: package.current_stage,
                stored_seal_status: package.seal_status,
                derived_stage: derived.stage,
                derived_seal_status: derived.seal_status,
            });
        }
    }

    AuditReport {
        package_id: package.package_id.clone(),
        update_count: updates.len(),
        findings,
    }
}
