//! Authenticated manager console.
//!
//! Resolves the acting user from the identity provider before every mutation.
//! Without a signed-in user, mutations fail with `Unauthenticated` and never
//! reach the store.

use std::sync::Arc;

use tracing::warn;

use super::{LifecycleEngine, Result};
use crate::error::LifecycleError;
use crate::identity::IdentityProvider;
use crate::model::{
    Actor, AppliedUpdate, NewPackage, Package, SealStatus, Stage, TrackingReport, Update,
};

pub struct ManagerConsole {
    engine: LifecycleEngine,
    identity: Arc<dyn IdentityProvider>,
}

impl ManagerConsole {
    pub fn new(engine: LifecycleEngine, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { engine, identity }
    }

    pub fn engine(&self) -> &LifecycleEngine {
        &self.engine
    }

    async fn actor(&self) -> Result<Actor> {
        self.identity.current_user().await.ok_or_else(|| {
            warn!("Mutation attempted without a signed-in user");
            LifecycleError::Unauthenticated
        })
    }

    pub async fn create_package(&self, package: NewPackage) -> Result<Package> {
        let actor = self.actor().await?;
        self.engine.create_package(package, &actor).await
    }

    pub async fn apply_update(
        &self,
        package_id: &str,
        stage: Stage,
        seal_status: SealStatus,
    ) -> Result<AppliedUpdate> {
        let actor = self.actor().await?;
        self.engine
            .apply_update(package_id, stage, seal_status, &actor)
            .await
    }

    /// Form-style entry point: stage and seal arrive as display strings.
    pub async fn submit_update(
        &self,
        package_id: &str,
        stage: &str,
        seal_status: &str,
    ) -> Result<AppliedUpdate> {
        let actor = self.actor().await?;
        let stage: Stage = stage.parse()?;
        let seal_status: SealStatus = seal_status.parse()?;
        self.engine
            .apply_update(package_id, stage, seal_status, &actor)
            .await
    }

    pub async fn timeline(&self, package_id: &str) -> Result<Vec<Update>> {
        self.engine.timeline(package_id).await
    }

    pub async fn track(&self, package_id: &str) -> Result<TrackingReport> {
        self.engine.track(package_id).await
    }
}
