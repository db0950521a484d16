//! Snowflake ids for every persisted row.
//!
//! Layout: 41 bits of milliseconds since [`EPOCH_MS`], 10 bits of node id,
//! 12 bits of per-millisecond sequence.

use std::sync::Mutex;

use chrono::Utc;

const EPOCH_MS: i64 = 1_288_834_974_657;
const NODE_BITS: u32 = 10;
const SEQ_BITS: u32 = 12;
const SEQ_MASK: i64 = (1 << SEQ_BITS) - 1;
const NODE_MASK: i64 = (1 << NODE_BITS) - 1;

#[derive(Debug)]
pub struct Snowflake {
  node: i64,
  // (last millisecond handed out, sequence within it)
  state: Mutex<(i64, i64)>,
}

impl Snowflake {
  pub fn new(node: i64) -> Self {
    Self { node: node & NODE_MASK, state: Mutex::new((0, 0)) }
  }

  pub fn next_id(&self) -> i64 {
    let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());
    let (last, seq) = *state;

    let now = Utc::now().timestamp_millis() - EPOCH_MS;
    // never step back, even if the wall clock does
    let (ms, seq) = if now > last {
      (now, 0)
    } else if seq < SEQ_MASK {
      (last, seq + 1)
    } else {
      (last + 1, 0)
    };

    *state = (ms, seq);
    (ms << (NODE_BITS + SEQ_BITS)) | (self.node << SEQ_BITS) | seq
  }
}
