//! PostgreSQL LISTEN/NOTIFY change feed.
//!
//! Insert triggers on both tables (see `storage::schema::POSTGRES_SCHEMA`)
//! send `{"table": ..., "key": ...}` on [`NOTIFY_CHANNEL`]. Each subscription
//! owns a dedicated listener connection.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};

use super::{
    ChangeFeed, FeedSignal, InsertHandler, InsertNotification, Result, Subscription, Table,
};
use crate::storage::schema::NOTIFY_CHANNEL;

/// Change feed backed by PostgreSQL notifications.
pub struct PgNotifyFeed {
    pool: PgPool,
}

impl PgNotifyFeed {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Decode a trigger payload.
fn parse_payload(payload: &str) -> Result<InsertNotification> {
    Ok(serde_json::from_str(payload)?)
}

#[async_trait]
impl ChangeFeed for PgNotifyFeed {
    #[tracing::instrument(name = "feed.publish", skip_all, fields(table = %notification.table))]
    async fn publish(&self, notification: InsertNotification) -> Result<()> {
        let payload = serde_json::to_string(&notification)?;
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(NOTIFY_CHANNEL)
            .bind(payload)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn subscribe(&self, table: Table, handler: Arc<dyn InsertHandler>) -> Result<Subscription> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(NOTIFY_CHANNEL).await?;

        let task = tokio::spawn(async move {
            loop {
                match listener.try_recv().await {
                    Ok(Some(message)) => match parse_payload(message.payload()) {
                        Ok(notification) if notification.table == table => {
                            handler.on_signal(FeedSignal::Insert(notification)).await;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(%table, error = %e, "Ignoring malformed notification");
                        }
                    },
                    Ok(None) => {
                        // Connection dropped; sqlx re-listens on the next
                        // call, but anything sent in between is gone.
                        warn!(%table, "Listener connection lost, notifications may be missed");
                        handler.on_signal(FeedSignal::Lagged(0)).await;
                    }
                    Err(e) => {
                        error!(%table, error = %e, "Listener failed, stopping subscriber");
                        handler.on_signal(FeedSignal::Closed).await;
                        break;
                    }
                }
            }
            debug!(%table, "Listener task finished");
        });

        info!(%table, channel = NOTIFY_CHANNEL, "Subscribed to PostgreSQL notifications");

        Ok(Subscription::new(table, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_parse_trigger_payload() {
        let key = Uuid::new_v4();
        let payload = format!(r#"{{"table": "packages", "key": "{key}"}}"#);
        assert_eq!(
            parse_payload(&payload).unwrap(),
            InsertNotification::new(Table::Packages, key)
        );
    }

    #[test]
    fn test_parse_rejects_unknown_table() {
        let payload = format!(r#"{{"table": "users", "key": "{}"}}"#, Uuid::new_v4());
        assert!(parse_payload(&payload).is_err());
    }
}
