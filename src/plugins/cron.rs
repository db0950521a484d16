//! Periodic housekeeping of the session store

use crate::{plugins::Plugin, prelude::*, state::AppState};

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Caps session keys that lost their expiry
pub struct SessionCleanup;

#[async_trait]
impl Plugin for SessionCleanup {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let mut interval = time::interval(app.config.cleanup_interval);
    // the first tick completes immediately
    interval.tick().await;

    loop {
      interval.tick().await;
      info!("Cleaning up session keys...");

      match app.sv().sessions.cleanup().await {
        Ok(0) => debug!("No session keys needed an expiry"),
        Ok(capped) => info!("Capped expiry of {capped} session keys"),
        Err(err) => error!("Session cleanup failed: {err}"),
      }
    }
  }
}

/// Drops expired entries of the in-memory store. Redis expires on its own.
pub struct PurgeExpired;

#[async_trait]
impl Plugin for PurgeExpired {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    loop {
      time::sleep(PURGE_INTERVAL).await;

      match app.kv.purge_expired().await {
        Ok(0) => {}
        Ok(purged) => debug!("Purged {purged} expired session keys"),
        Err(err) => error!("Failed to purge expired session keys: {err}"),
      }
    }
  }
}
