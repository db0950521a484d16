//! Time source shared by the services and the in-memory session store.
//!
//! Everything that compares against "now" asks a [`Clock`] instead of calling
//! `Utc::now()` directly, so tests can move time forward.

use chrono::{NaiveDateTime as DateTime, Utc};

pub trait Clock: Send + Sync {
  /// Current UTC time
  fn now(&self) -> DateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime {
    Utc::now().naive_utc()
  }
}

#[cfg(test)]
pub use manual::ManualClock;
