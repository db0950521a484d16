use redis::{Client, aio::ConnectionManager};

use super::{KvStore, Ttl};
use crate::prelude::*;

const SCAN_BATCH: usize = 100;

#[derive(Clone)]
pub struct RedisKv {
  conn: ConnectionManager,
}

impl RedisKv {
  pub async fn connect(url: &str) -> Result<Self> {
    let client = Client::open(url)?;
    let conn = ConnectionManager::new(client).await?;
    info!("Connected to Redis");
    Ok(Self { conn })
  }
}

#[async_trait]
impl KvStore for RedisKv {
  async fn get(&self, key: &str) -> Result<Option<String>> {
    let mut conn = self.conn.clone();
    let value: Option<String> =
      redis::cmd("GET").arg(key).query_async(&mut conn).await?;
    Ok(value)
  }

  async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
    let mut conn = self.conn.clone();
    let _: () = redis::cmd("SET")
      .arg(key)
      .arg(value)
      .arg("EX")
      .arg(ttl.as_secs().max(1))
      .query_async(&mut conn)
      .await?;
    Ok(())
  }

  async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
    let mut conn = self.conn.clone();
    let pattern = format!("{prefix}*");
    let mut cursor: u64 = 0;
    let mut keys = Vec::new();

    loop {
      let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
        .arg(cursor)
        .arg("MATCH")
        .arg(&pattern)
        .arg("COUNT")
        .arg(SCAN_BATCH)
        .query_async(&mut conn)
        .await?;

      keys.extend(batch);
      if next == 0 {
        break;
      }
      cursor = next;
    }

    Ok(keys)
  }

  async fn ttl(&self, key: &str) -> Result<Ttl> {
    let mut conn = self.conn.clone();
    let secs: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
    Ok(match secs {
      -2 => Ttl::Missing,
      -1 => Ttl::Persistent,
      secs => Ttl::Expires(Duration::from_secs(secs.max(0) as u64)),
    })
  }

  async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
    let mut conn = self.conn.clone();
    let _: i64 = redis::cmd("EXPIRE")
      .arg(key)
      .arg(ttl.as_secs().max(1))
      .query_async(&mut conn)
      .await?;
    Ok(())
  }
}
