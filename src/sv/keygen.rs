use std::future::Future;

use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

use crate::{entity::license_key, prelude::*};

/// Candidates tried before giving up on a unique key
pub const KEY_ATTEMPTS: usize = 10;

fn random_bytes() -> Result<[u8; 16]> {
  let mut bytes = [0; 16];
  OsRng
    .try_fill_bytes(&mut bytes)
    .map_err(|err| Error::RandomGeneration(err.to_string()))?;
  Ok(bytes)
}

/// 32 hex chars: the first half of a SHA-256 digest over fresh random bytes
pub fn candidate_key() -> Result<String> {
  let digest = Sha256::digest(random_bytes()?);
  Ok(hex::encode(&digest[..16]))
}

/// Opaque session token, never checked for collisions
pub fn usage_id() -> Result<String> {
  Ok(hex::encode(random_bytes()?))
}

pub async fn retry_unique<G, F, Fut>(
  mut generate: G,
  mut exists: F,
) -> Result<String>
where
  G: FnMut() -> Result<String>,
  F: FnMut(String) -> Fut,
  Fut: Future<Output = Result<bool>>,
{
  for attempt in 1..=KEY_ATTEMPTS {
    let candidate = generate()?;
    if !exists(candidate.clone()).await? {
      return Ok(candidate);
    }
    warn!("License key collision on attempt {attempt}");
  }
  Err(Error::KeyExhausted(KEY_ATTEMPTS))
}

/// Key not yet present in `license_keys`. The unique index still guards
/// the insert against a concurrent writer picking the same value.
pub async fn unique_key<C: ConnectionTrait>(db: &C) -> Result<String> {
  retry_unique(candidate_key, |key| async move {
    let found = license_key::Entity::find()
      .filter(license_key::Column::Key.eq(key))
      .count(db)
      .await?;
    Ok(found > 0)
  })
  .await
}
