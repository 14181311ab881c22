//! Live sync configuration.

use serde::Deserialize;

use crate::sync::channel::DEFAULT_CHANNEL_CAPACITY;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How many recent updates a dashboard shows.
    pub recent_updates_limit: u32,
    /// Broadcast capacity of the in-process change feed.
    pub channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            recent_updates_limit: 5,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}
