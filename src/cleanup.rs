//! Background sweep of expired refresh tokens and blacklist rows.
//!
//! One periodic task, spawned at startup and aborted on shutdown. Each tick
//! issues the stores' atomic delete-by-predicate operations, so the sweep
//! never races read-then-delete against concurrent rotations. The two
//! purges are independent: one failing does not stop the other, and a
//! failed tick is simply retried by the next one.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::store::{RefreshTokenStore, TokenBlacklistStore};

pub struct CleanupTask {
    handle: JoinHandle<()>,
}

impl CleanupTask {
    pub fn stop(self) {
        self.handle.abort();
    }
}

/// Spawn the sweep loop. `interval_secs == 0` disables it.
pub fn spawn(
    refresh: Arc<dyn RefreshTokenStore>,
    blacklist: Arc<dyn TokenBlacklistStore>,
    interval_secs: u64,
) -> Option<CleanupTask> {
    if interval_secs == 0 {
        info!("token cleanup task disabled");
        return None;
    }
    let handle = tokio::spawn(async move {
        loop {
            sweep(refresh.as_ref(), blacklist.as_ref()).await;
            tokio::time::sleep(std::time::Duration::from_secs(interval_secs)).await;
        }
    });
    Some(CleanupTask { handle })
}

/// One best-effort pass over both stores.
pub async fn sweep(refresh: &dyn RefreshTokenStore, blacklist: &dyn TokenBlacklistStore) {
    let now = Utc::now();
    match refresh.purge_expired_before(now).await {
        Ok(removed) if removed > 0 => debug!(removed, "purged expired refresh tokens"),
        Ok(_) => {}
        Err(e) => error!("refresh token purge failed: {e}"),
    }
    match blacklist.purge_expired_before(now).await {
        Ok(removed) if removed > 0 => debug!(removed, "purged expired blacklist entries"),
        Ok(_) => {}
        Err(e) => error!("blacklist purge failed: {e}"),
    }
}
