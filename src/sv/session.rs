//! Free and paid usage sessions, kept in the key-value store only.
//!
//! `free:<usage_id>` is the whole free-tier grant; `paid:<usage_id>` is a
//! last-seen marker for analytics and never consulted for validity.

use serde::{Deserialize, Serialize};

use crate::{
  kv::{KvStore, Ttl},
  prelude::*,
  sv::keygen,
};

pub const FREE: &str = "free:";
pub const PAID: &str = "paid:";

/// Ceiling enforced on free-tier TTLs by the cleanup sweep
pub const MAX_SESSION_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

const ACTIVE_WINDOW: TimeDelta = TimeDelta::minutes(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
  usage_id: String,
  is_paid_tier: bool,
  last_seen: DateTime,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActiveUsers {
  pub free: u64,
  pub paid: u64,
  pub total: u64,
}

pub struct Sessions<'a> {
  kv: &'a dyn KvStore,
  clock: &'a dyn Clock,
  ttl: Duration,
}

impl<'a> Sessions<'a> {
  pub fn new(kv: &'a dyn KvStore, clock: &'a dyn Clock, ttl: Duration) -> Self {
    Self { kv, clock, ttl }
  }

  async fn touch(&self, prefix: &str, usage_id: &str, paid: bool) -> Result<()> {
    let record = Record {
      usage_id: usage_id.to_string(),
      is_paid_tier: paid,
      last_seen: self.clock.now(),
    };
    let key = format!("{prefix}{usage_id}");
    self.kv.set_ex(&key, &json::to_string(&record)?, self.ttl).await
  }

  pub async fn create_free_session(&self) -> Result<String> {
    let usage_id = keygen::usage_id()?;
    self.touch(FREE, &usage_id, false).await?;
    Ok(usage_id)
  }

  /// Writes or refreshes the paid marker and restarts its TTL
  pub async fn track_paid_session(&self, usage_id: &str) -> Result<()> {
    self.touch(PAID, usage_id, true).await
  }

  pub async fn validate_free_session(&self, usage_id: &str) -> Result<()> {
    let key = format!("{FREE}{usage_id}");
    if self.kv.get(&key).await?.is_none() {
      return Err(Error::SessionNotFound);
    }
    self.touch(FREE, usage_id, false).await
  }

  async fn count_recent(&self, prefix: &str, since: DateTime) -> Result<u64> {
    let mut count = 0;
    for key in self.kv.keys(prefix).await? {
      let raw = match self.kv.get(&key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => continue,
        Err(err) => {
          debug!("Skipping unreadable session `{key}`: {err}");
          continue;
        }
      };
      match json::from_str::<Record>(&raw) {
        Ok(record) if record.last_seen >= since => count += 1,
        Ok(_) => {}
        Err(err) => warn!("Skipping malformed session `{key}`: {err}"),
      }
    }
    Ok(count)
  }

  /// Sessions seen within the last 30 minutes. Scans both namespaces.
  pub async fn active_users(&self) -> Result<ActiveUsers> {
    let since = self.clock.now() - ACTIVE_WINDOW;
    let free = self.count_recent(FREE, since).await?;
    let paid = self.count_recent(PAID, since).await?;
    Ok(ActiveUsers { free, paid, total: free + paid })
  }

  /// Caps free-tier keys that have no TTL or one above [`MAX_SESSION_AGE`].
  /// Keys that fail are skipped. Returns how many keys were capped.
  pub async fn cleanup(&self) -> Result<usize> {
    let mut capped = 0;
    for key in self.kv.keys(FREE).await? {
      let ttl = match self.kv.ttl(&key).await {
        Ok(ttl) => ttl,
        Err(err) => {
          debug!("TTL lookup of `{key}` failed: {err}");
          continue;
        }
      };

      let runaway = match ttl {
        Ttl::Persistent => true,
        Ttl::Expires(left) => left > MAX_SESSION_AGE,
        Ttl::Missing => false,
      };
      if !runaway {
        continue;
      }
      match self.kv.expire(&key, MAX_SESSION_AGE).await {
        Ok(()) => capped += 1,
        Err(err) => warn!("Failed to cap TTL of `{key}`: {err}"),
      }
    }
    Ok(capped)
  }
}
