//! In-memory TrackingStore implementation.
//!
//! Process-local storage for development and tests. Writes are applied under
//! a single write lock, so each operation is atomic. Failure points can be
//! armed to exercise error paths, including a failure between the package
//! row and its genesis update.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::helpers::{genesis_rows, next_timestamp, update_from_draft};
use super::{PackageDirectory, Result, StorageError, TrackingStore, UpdateLog};
use crate::model::{NewPackage, Package, RecentUpdate, Update, UpdateDraft};

/// Where an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// Every read operation.
    Read,
    /// Before the package row is written.
    PackageInsert,
    /// After the package row is staged, before the genesis update.
    GenesisInsert,
    /// Before an update is appended.
    Append,
}

#[derive(Default)]
struct State {
    packages: HashMap<Uuid, Package>,
    keys_by_id: HashMap<String, Uuid>,
    /// Package keys in creation order.
    created: Vec<Uuid>,
    /// Global insertion order, which is also `created_at` order.
    updates: Vec<Update>,
}

/// In-memory store with failure injection.
#[derive(Default)]
pub struct InMemoryTrackingStore {
    state: RwLock<State>,
    fail_points: RwLock<HashSet<FailPoint>>,
}

impl InMemoryTrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_at(&self, point: FailPoint) {
        self.fail_points.write().await.insert(point);
    }

    pub async fn clear_failures(&self) {
        self.fail_points.write().await.clear();
    }

    /// Insert rows verbatim, bypassing every invariant.
    ///
    /// Used to load fixtures and legacy data written without transactions.
    pub async fn seed_unchecked(&self, package: Package, updates: Vec<Update>) {
        let mut state = self.state.write().await;
        state
            .keys_by_id
            .insert(package.package_id.clone(), package.key);
        state.created.push(package.key);
        state.packages.insert(package.key, package);
        state.updates.extend(updates);
        state.updates.sort_by_key(|u| (u.created_at, u.sequence));
    }

    async fn check(&self, point: FailPoint) -> Result<()> {
        if self.fail_points.read().await.contains(&point) {
            return Err(StorageError::Injected(format!("{point:?}")));
        }
        Ok(())
    }
}

#[async_trait]
impl PackageDirectory for InMemoryTrackingStore {
    async fn find_package(&self, package_id: &str) -> Result<Option<Package>> {
        self.check(FailPoint::Read).await?;
        let state = self.state.read().await;
        Ok(state
            .keys_by_id
            .get(package_id)
            .and_then(|key| state.packages.get(key))
            .cloned())
    }

    async fn list_packages(&self) -> Result<Vec<Package>> {
        self.check(FailPoint::Read).await?;
        let state = self.state.read().await;
        let mut packages: Vec<Package> = state
            .created
            .iter()
            .rev()
            .filter_map(|key| state.packages.get(key))
            .cloned()
            .collect();
        // Stable, so equal timestamps keep newest-created first.
        packages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(packages)
    }
}

#[async_trait]
impl UpdateLog for InMemoryTrackingStore {
    async fn updates_for(&self, package_key: Uuid) -> Result<Vec<Update>> {
        self.check(FailPoint::Read).await?;
        let state = self.state.read().await;
        Ok(state
            .updates
            .iter()
            .filter(|u| u.package_key == package_key)
            .cloned()
            .collect())
    }

    async fn recent_updates(&self, limit: u32) -> Result<Vec<RecentUpdate>> {
        self.check(FailPoint::Read).await?;
        let state = self.state.read().await;
        Ok(state
            .updates
            .iter()
            .rev()
            .take(limit as usize)
            .filter_map(|update| {
                state.packages.get(&update.package_key).map(|p| RecentUpdate {
                    package_id: p.package_id.clone(),
                    update: update.clone(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl TrackingStore for InMemoryTrackingStore {
    async fn create_package(
        &self,
        package: NewPackage,
        created_by: &str,
        genesis: UpdateDraft,
    ) -> Result<(Package, Update)> {
        self.check(FailPoint::PackageInsert).await?;

        let mut state = self.state.write().await;
        if state.keys_by_id.contains_key(&package.package_id) {
            return Err(StorageError::DuplicatePackage(package.package_id));
        }

        let created_at = next_timestamp(state.updates.last().map(|u| u.created_at));
        let (row, update) = genesis_rows(package, created_by, genesis, created_at);

        // Nothing has been committed to `state` yet, so failing here leaves
        // no trace of the package.
        self.check(FailPoint::GenesisInsert).await?;

        state.keys_by_id.insert(row.package_id.clone(), row.key);
        state.created.push(row.key);
        state.packages.insert(row.key, row.clone());
        state.updates.push(update.clone());

        Ok((row, update))
    }

    async fn append_update(
        &self,
        package_key: Uuid,
        draft: UpdateDraft,
    ) -> Result<(Package, Update)> {
        self.check(FailPoint::Append).await?;

        let mut state = self.state.write().await;
        if !state.packages.contains_key(&package_key) {
            return Err(StorageError::MissingPackage(package_key));
        }

        let (last_sequence, last_created_at) = state
            .updates
            .iter()
            .filter(|u| u.package_key == package_key)
            .map(|u| (u.sequence, u.created_at))
            .max()
            .unzip();
        let sequence = last_sequence.map(|s| s + 1).unwrap_or(0);
        // Clamp to the global tail as well so `updates` stays time-ordered.
        let floor = last_created_at.max(state.updates.last().map(|u| u.created_at));
        let created_at = next_timestamp(floor);

        let update = update_from_draft(package_key, sequence, draft, created_at);
        let package = match state.packages.get_mut(&package_key) {
            Some(package) => {
                package.current_stage = update.stage;
                package.seal_status = update.seal_status;
                package.updated_at = created_at;
                package.clone()
            }
            None => return Err(StorageError::MissingPackage(package_key)),
        };
        state.updates.push(update.clone());

        Ok((package, update))
    }
}
