use crate::{
  entity::activity::{self, Kind},
  prelude::*,
};

/// Audit record, written inside the transaction of the operation it describes
pub struct Entry {
  kind: Kind,
  user_id: Option<i64>,
  license_key_id: Option<i64>,
  payment_id: Option<i64>,
}

impl Entry {
  pub fn new(kind: Kind) -> Self {
    Self { kind, user_id: None, license_key_id: None, payment_id: None }
  }

  pub fn user(self, id: i64) -> Self {
    Self { user_id: Some(id), ..self }
  }

  pub fn license(self, id: i64) -> Self {
    Self { license_key_id: Some(id), ..self }
  }

  pub fn payment(self, id: i64) -> Self {
    Self { payment_id: Some(id), ..self }
  }

  pub async fn insert<C: ConnectionTrait>(
    self,
    db: &C,
    ids: &Snowflake,
    now: DateTime,
  ) -> Result<activity::Model> {
    let activity = activity::ActiveModel {
      id: Set(ids.next_id()),
      kind: Set(self.kind),
      user_id: Set(self.user_id),
      license_key_id: Set(self.license_key_id),
      payment_id: Set(self.payment_id),
      created_at: Set(now),
    };

    Ok(activity.insert(db).await?)
  }
}
