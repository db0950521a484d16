//! Key-value backends for ephemeral session data.
//!
//! Values are opaque strings with a per-key TTL. There are no cross-key
//! transactions: every call is atomic for its own key only.

mod memory;
mod remote;

pub use memory::MemoryKv;
pub use remote::RedisKv;

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
  Missing,
  Persistent,
  Expires(Duration),
}

#[async_trait]
pub trait KvStore: Send + Sync {
  async fn get(&self, key: &str) -> Result<Option<String>>;

  /// Writes `value` and (re)starts its TTL
  async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

  /// All live keys starting with `prefix`
  async fn keys(&self, prefix: &str) -> Result<Vec<String>>;

  async fn ttl(&self, key: &str) -> Result<Ttl>;

  async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

  /// Drops entries whose TTL elapsed. Backends with native expiry skip it.
  async fn purge_expired(&self) -> Result<usize> {
    Ok(0)
  }
}
