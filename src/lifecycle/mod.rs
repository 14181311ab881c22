//! Package lifecycle engine.
//!
//! Validates and applies stage/seal transitions. Every mutation goes through
//! the store's atomic writes, so a package's projection only ever moves
//! together with an appended update. The engine never retries; callers
//! decide based on [`LifecycleError::kind`](crate::error::LifecycleError::kind).

use std::sync::Arc;

use tracing::{error, info};

use crate::error::LifecycleError;
use crate::model::{
    Actor, AppliedUpdate, NewPackage, Package, RecentUpdate, SealStatus, Stage, TimelineEntry,
    TrackingReport, Update, UpdateDraft, UpdateSnapshot, ValidationError,
};
use crate::storage::{StorageError, TrackingStore};

pub mod console;
pub mod projection;

pub use console::ManagerConsole;
pub use projection::{audit, project, AuditFinding, AuditReport, Projection};

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Entry point for creating packages and recording transitions.
///
/// Cheap to clone; clones share the underlying store.
#[derive(Clone)]
pub struct LifecycleEngine {
    store: Arc<dyn TrackingStore>,
}

impl LifecycleEngine {
    pub fn new(store: Arc<dyn TrackingStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn TrackingStore> {
        &self.store
    }

    /// Create a package together with its genesis update.
    ///
    /// Fails with `DuplicateIdentifier` when `package_id` is taken, leaving
    /// the existing package and its history unchanged.
    #[tracing::instrument(name = "lifecycle.create_package", skip_all, fields(package_id = %package.package_id))]
    pub async fn create_package(&self, package: NewPackage, actor: &Actor) -> Result<Package> {
        package.validate()?;

        let existing = self
            .store
            .find_package(&package.package_id)
            .await
            .map_err(LifecycleError::Creation)?;
        if existing.is_some() {
            return Err(LifecycleError::DuplicateIdentifier(package.package_id));
        }

        // The store's uniqueness constraint still catches a concurrent
        // creator that slipped in after the check above.
        match self
            .store
            .create_package(package, &actor.id, UpdateDraft::genesis(actor))
            .await
        {
            Ok((package, genesis)) => {
                info!(key = %package.key, genesis = %genesis.key, "Package created");
                Ok(package)
            }
            Err(StorageError::DuplicatePackage(package_id)) => {
                Err(LifecycleError::DuplicateIdentifier(package_id))
            }
            Err(e) => {
                error!(error = %e, "Package creation failed");
                Err(LifecycleError::Creation(e))
            }
        }
    }

    /// Append a transition and patch the package's projection to match.
    ///
    /// Not idempotent: identical calls append identical transitions.
    #[tracing::instrument(name = "lifecycle.apply_update", skip_all, fields(package_id = %package_id, stage = %stage, seal_status = %seal_status))]
    pub async fn apply_update(
        &self,
        package_id: &str,
        stage: Stage,
        seal_status: SealStatus,
        actor: &Actor,
    ) -> Result<AppliedUpdate> {
        if package_id.trim().is_empty() {
            return Err(ValidationError::MissingField("package_id").into());
        }

        let package = self
            .store
            .find_package(package_id)
            .await
            .map_err(LifecycleError::Update)?
            .ok_or_else(|| LifecycleError::NotFound(package_id.to_string()))?;

        let draft = UpdateDraft::transition(stage, seal_status, actor);
        match self.store.append_update(package.key, draft).await {
            Ok((package, update)) => {
                info!(key = %update.key, sequence = update.sequence, "Update applied");
                let snapshot = UpdateSnapshot::new(&package.package_id, &update, actor);
                Ok(AppliedUpdate {
                    package,
                    update,
                    snapshot,
                })
            }
            Err(StorageError::MissingPackage(_)) => {
                Err(LifecycleError::NotFound(package_id.to_string()))
            }
            Err(e) => {
                error!(error = %e, "Update failed");
                Err(LifecycleError::Update(e))
            }
        }
    }

    /// Full history of a package, oldest first.
    #[tracing::instrument(name = "lifecycle.timeline", skip_all, fields(package_id = %package_id))]
    pub async fn timeline(&self, package_id: &str) -> Result<Vec<Update>> {
        let (_, updates) = self.load(package_id).await?;
        Ok(updates)
    }

    /// Public tracking view. Needs no signed-in user.
    #[tracing::instrument(name = "lifecycle.track", skip_all, fields(package_id = %package_id))]
    pub async fn track(&self, package_id: &str) -> Result<TrackingReport> {
        let (package, updates) = self.load(package_id).await?;
        Ok(TrackingReport {
            package_id: package.package_id,
            status: package.current_stage,
            seal_status: package.seal_status,
            timeline: updates.iter().map(TimelineEntry::from).collect(),
        })
    }

    /// Compare the stored projection with the one derived from the log.
    /// Reports problems; repairs nothing.
    #[tracing::instrument(name = "lifecycle.audit", skip_all, fields(package_id = %package_id))]
    pub async fn audit(&self, package_id: &str) -> Result<AuditReport> {
        let (package, updates) = self.load(package_id).await?;
        Ok(projection::audit(&package, &updates))
    }

    /// All packages, newest first.
    pub async fn list_packages(&self) -> Result<Vec<Package>> {
        self.store
            .list_packages()
            .await
            .map_err(LifecycleError::Lookup)
    }

    /// The `limit` most recent updates across all packages, newest first.
    pub async fn recent_updates(&self, limit: u32) -> Result<Vec<RecentUpdate>> {
        self.store
            .recent_updates(limit)
            .await
            .map_err(LifecycleError::Lookup)
    }

    async fn load(&self, package_id: &str) -> Result<(Package, Vec<Update>)> {
        let package = self
            .store
            .find_package(package_id)
            .await
            .map_err(LifecycleError::Lookup)?
            .ok_or_else(|| LifecycleError::NotFound(package_id.to_string()))?;
        let updates = self
            .store
            .updates_for(package.key)
            .await
            .map_err(LifecycleError::Lookup)?;
        Ok((package, updates))
    }
}
