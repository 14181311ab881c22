//! Identity provider seam.
//!
//! Mutating operations require a signed-in user; tracking lookups do not.
//! The real provider is external. `StaticIdentity` is an in-process stand-in
//! with a fixed account list, for the monitor binary and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::model::Actor;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("Invalid email or password")]
    InvalidCredentials,
}

/// Source of the current user.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user, if any.
    async fn current_user(&self) -> Option<Actor>;

    async fn sign_in(&self, email: &str, secret: &str) -> Result<Actor, IdentityError>;

    async fn sign_out(&self);
}

struct Account {
    actor: Actor,
    secret: String,
}

/// Fixed set of accounts held in memory.
#[derive(Default)]
pub struct StaticIdentity {
    accounts: HashMap<String, Account>,
    current: RwLock<Option<Actor>>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account, keyed by email.
    pub fn with_account(
        mut self,
        id: impl Into<String>,
        email: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        let actor = Actor::new(id, email);
        self.accounts.insert(
            actor.email.clone(),
            Account {
                actor,
                secret: secret.into(),
            },
        );
        self
    }

    /// Provider with `actor` already signed in.
    pub fn signed_in(actor: Actor) -> Self {
        Self {
            accounts: HashMap::new(),
            current: RwLock::new(Some(actor)),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> Option<Actor> {
        self.current.read().await.clone()
    }

    async fn sign_in(&self, email: &str, secret: &str) -> Result<Actor, IdentityError> {
        let account = self
            .accounts
            .get(email)
            .filter(|account| account.secret == secret)
            .ok_or(IdentityError::InvalidCredentials)?;

        *self.current.write().await = Some(account.actor.clone());
        info!(user = %account.actor.email, "Signed in");
        Ok(account.actor.clone())
    }

    async fn sign_out(&self) {
        if let Some(actor) = self.current.write().await.take() {
            info!(user = %actor.email, "Signed out");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> StaticIdentity {
        StaticIdentity::new().with_account("mgr-1", "manager@example.com", "hunter2")
    }

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let identity = provider();
        assert_eq!(identity.current_user().await, None);

        let actor = identity
            .sign_in("manager@example.com", "hunter2")
            .await
            .unwrap();
        assert_eq!(actor.id, "mgr-1");
        assert_eq!(identity.current_user().await, Some(actor));

        identity.sign_out().await;
        assert_eq!(identity.current_user().await, None);
    }

    #[tokio::test]
    async fn test_wrong_secret_is_rejected() {
        let identity = provider();
        assert_eq!(
            identity.sign_in("manager@example.com", "nope").await,
            Err(IdentityError::InvalidCredentials)
        );
        assert_eq!(
            identity.sign_in("someone@example.com", "hunter2").await,
            Err(IdentityError::InvalidCredentials)
        );
        assert_eq!(identity.current_user().await, None);
    }
}
