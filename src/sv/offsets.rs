//! Per-build memory offsets, published by admins and kept one row per
//! client version.

use sea_orm::sea_query::OnConflict;

use crate::{entity::offset, prelude::*};

pub struct Offsets<'a> {
  db: &'a DatabaseConnection,
  ids: &'a Snowflake,
  clock: &'a dyn Clock,
}

impl<'a> Offsets<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    ids: &'a Snowflake,
    clock: &'a dyn Clock,
  ) -> Self {
    Self { db, ids, clock }
  }

  pub async fn by_version(
    &self,
    version: &str,
  ) -> Result<Option<offset::Model>> {
    let offsets = offset::Entity::find()
      .filter(offset::Column::Version.eq(version))
      .one(self.db)
      .await?;
    Ok(offsets)
  }

  /// Creates the offsets of `version` or replaces the stored document
  pub async fn update(
    &self,
    version: &str,
    data: &json::Value,
  ) -> Result<offset::Model> {
    if version.is_empty() {
      return Err(Error::MissingInput("version"));
    }
    if data.is_null() {
      return Err(Error::MissingInput("offsets"));
    }

    let now = self.clock.now();
    let row = offset::ActiveModel {
      id: Set(self.ids.next_id()),
      version: Set(version.to_string()),
      data: Set(data.to_string()),
      created_at: Set(now),
      updated_at: Set(now),
    };

    offset::Entity::insert(row)
      .on_conflict(
        OnConflict::column(offset::Column::Version)
          .update_columns([offset::Column::Data, offset::Column::UpdatedAt])
          .to_owned(),
      )
      .exec(self.db)
      .await?;

    info!("Offsets of version `{version}` updated");
    self
      .by_version(version)
      .await?
      .ok_or_else(|| Error::Internal(format!("offsets of `{version}` lost")))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::Fixture;

  fn sv(fx: &Fixture) -> Offsets<'_> {
    Offsets::new(&fx.db, &fx.ids, fx.clock.as_ref())
  }

  #[tokio::test]
  async fn test_update_creates_then_replaces() {
    let fx = Fixture::new().await;
    assert_eq!(sv(&fx).by_version("1.0.0").await.unwrap(), None);

    let first = sv(&fx)
      .update("1.0.0", &json::json!({ "player": 4096 }))
      .await
      .unwrap();
    assert_eq!(first.data, r#"{"player":4096}"#);

    fx.clock.advance(TimeDelta::minutes(5));
    let second = sv(&fx)
      .update("1.0.0", &json::json!({ "player": 8192 }))
      .await
      .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.updated_at, fx.clock.now());
    assert_eq!(second.data, r#"{"player":8192}"#);
    assert_eq!(offset::Entity::find().count(&fx.db).await.unwrap(), 1);
  }

  #[tokio::test]
  async fn test_versions_are_independent() {
    let fx = Fixture::new().await;
    sv(&fx).update("1.0.0", &json::json!([1])).await.unwrap();
    sv(&fx).update("1.1.0", &json::json!([2])).await.unwrap();

    let old = sv(&fx).by_version("1.0.0").await.unwrap().unwrap();
    assert_eq!(old.data, "[1]");
    assert_eq!(offset::Entity::find().count(&fx.db).await.unwrap(), 2);
  }

  #[tokio::test]
  async fn test_update_requires_input() {
    let fx = Fixture::new().await;

    assert!(matches!(
      sv(&fx).update("", &json::json!({})).await,
      Err(Error::MissingInput("version"))
    ));
    assert!(matches!(
      sv(&fx).update("1.0.0", &json::Value::Null).await,
      Err(Error::MissingInput("offsets"))
    ));
  }
}
