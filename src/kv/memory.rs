use dashmap::DashMap;

use super::{KvStore, Ttl};
use crate::prelude::*;

#[derive(Debug, Clone)]
struct Entry {
  value: String,
  expires_at: Option<DateTime>,
}

impl Entry {
  fn alive(&self, now: DateTime) -> bool {
    self.expires_at.is_none_or(|at| at > now)
  }
}

/// Process-local store, used when no Redis URL is configured.
/// Expired entries are invisible right away and dropped by `purge_expired`.
pub struct MemoryKv {
  entries: DashMap<String, Entry>,
  clock: Arc<dyn Clock>,
}

impl MemoryKv {
  pub fn new(clock: Arc<dyn Clock>) -> Self {
    Self { entries: DashMap::new(), clock }
  }

  fn deadline(&self, ttl: Duration) -> DateTime {
    let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::weeks(52 * 100));
    self.clock.now() + ttl
  }

  #[cfg(test)]
  pub fn insert_persistent(&self, key: &str, value: &str) {
    self
      .entries
      .insert(key.into(), Entry { value: value.into(), expires_at: None });
  }
}

#[async_trait]
impl KvStore for MemoryKv {
  async fn get(&self, key: &str) -> Result<Option<String>> {
    let now = self.clock.now();
    Ok(
      self
        .entries
        .get(key)
        .filter(|entry| entry.alive(now))
        .map(|entry| entry.value.clone()),
    )
  }

  async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
    let entry =
      Entry { value: value.to_string(), expires_at: Some(self.deadline(ttl)) };
    self.entries.insert(key.to_string(), entry);
    Ok(())
  }

  async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
    let now = self.clock.now();
    Ok(
      self
        .entries
        .iter()
        .filter(|kv| kv.key().starts_with(prefix) && kv.value().alive(now))
        .map(|kv| kv.key().clone())
        .collect(),
    )
  }

  async fn ttl(&self, key: &str) -> Result<Ttl> {
    let now = self.clock.now();
    let ttl = match self.entries.get(key) {
      Some(entry) if entry.alive(now) => match entry.expires_at {
        Some(at) => Ttl::Expires((at - now).to_std().unwrap_or_default()),
        None => Ttl::Persistent,
      },
      _ => Ttl::Missing,
    };
    Ok(ttl)
  }

  async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
    let now = self.clock.now();
    let deadline = self.deadline(ttl);
    if let Some(mut entry) = self.entries.get_mut(key)
      && entry.alive(now)
    {
      entry.expires_at = Some(deadline);
    }
    Ok(())
  }

  async fn purge_expired(&self) -> Result<usize> {
    let now = self.clock.now();
    let before = self.entries.len();
    self.entries.retain(|_, entry| entry.alive(now));
    Ok(before.saturating_sub(self.entries.len()))
  }
}
