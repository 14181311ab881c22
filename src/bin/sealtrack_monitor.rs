//! sealtrack-monitor: headless dashboard
//!
//! Mounts a dashboard view against the configured store and logs every
//! refreshed snapshot until interrupted.
//!
//! ## Architecture
//! ```text
//! [store] --(insert notifications)--> [dashboard view] --> log
//! ```
//!
//! ## Configuration
//! - First argument: optional path to a YAML config file
//! - SEALTRACK_CONFIG: config file path
//! - SEALTRACK__STORAGE__TYPE: memory | sqlite | postgres
//! - SEALTRACK_LOG: log filter (default: info)

use tracing::{info, warn};

use sealtrack::config::Config;
use sealtrack::storage::init_storage;
use sealtrack::sync::DashboardView;
use sealtrack::utils::bootstrap::init_tracing;
use sealtrack::LifecycleEngine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let path = std::env::args().nth(1);
    let config = Config::load(path.as_deref())?;

    let (store, feed) = init_storage(&config.storage, config.sync.channel_capacity).await?;
    let engine = LifecycleEngine::new(store);
    let view = DashboardView::new(engine, feed, config.sync.recent_updates_limit);
    let dashboard = view.mount().await?;
    let mut changes = dashboard.changes();

    info!(
        storage_type = ?config.storage.storage_type,
        recent_updates_limit = config.sync.recent_updates_limit,
        "sealtrack-monitor started"
    );

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = changes.borrow_and_update().clone();
                if snapshot.stale {
                    warn!("Change feed closed, showing last known state");
                }
                for recent in &snapshot.recent_updates {
                    info!(
                        package_id = %recent.package_id,
                        stage = %recent.update.stage,
                        seal_status = %recent.update.seal_status,
                        at = %recent.update.created_at,
                        "Recent update"
                    );
                }
                info!(
                    generation = snapshot.generation,
                    packages = snapshot.packages.len(),
                    stale = snapshot.stale,
                    "Dashboard refreshed"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    dashboard.unmount();
    Ok(())
}
