use crate::{
  entity::{activity::Kind, user},
  error::is_unique_violation,
  prelude::*,
  sv::activity::Entry,
};

/// Forum account as asserted by a verified SSO payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
  pub discourse_id: i64,
  pub username: String,
  pub email: String,
  pub is_admin: bool,
}

/// Who performs an operation. Passed explicitly into every mutating call
/// that depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
  pub user_id: i64,
  pub is_admin: bool,
}

pub struct User<'a, C = DatabaseConnection> {
  db: &'a C,
  ids: &'a Snowflake,
  clock: &'a dyn Clock,
}

impl<'a, C> User<'a, C>
where
  C: ConnectionTrait + TransactionTrait,
{
  pub fn new(db: &'a C, ids: &'a Snowflake, clock: &'a dyn Clock) -> Self {
    Self { db, ids, clock }
  }

  pub async fn by_id(&self, id: i64) -> Result<Option<user::Model>> {
    Ok(user::Entity::find_by_id(id).one(self.db).await?)
  }

  pub async fn by_email(&self, email: &str) -> Result<Option<user::Model>> {
    let user = user::Entity::find()
      .filter(user::Column::Email.eq(email))
      .one(self.db)
      .await?;
    Ok(user)
  }

  pub async fn by_discourse_id(
    &self,
    discourse_id: i64,
  ) -> Result<Option<user::Model>> {
    let user = user::Entity::find()
      .filter(user::Column::DiscourseId.eq(discourse_id))
      .one(self.db)
      .await?;
    Ok(user)
  }

  /// Local account for a forum identity, created on first sight.
  /// Username and email follow whatever the forum reports.
  pub async fn load_or_create(
    &self,
    identity: &Identity,
  ) -> Result<user::Model> {
    if let Some(user) = self.by_discourse_id(identity.discourse_id).await? {
      return self.refresh(user, identity).await;
    }

    match self.register(identity).await {
      Ok(user) => Ok(user),
      // lost a race against a concurrent first login
      Err(Error::Database(err)) if is_unique_violation(&err) => self
        .by_discourse_id(identity.discourse_id)
        .await?
        .ok_or(Error::UserNotFound),
      Err(err) => Err(err),
    }
  }

  async fn refresh(
    &self,
    user: user::Model,
    identity: &Identity,
  ) -> Result<user::Model> {
    if user.username == identity.username && user.email == identity.email {
      return Ok(user);
    }

    debug!("Refreshing profile of user {}", user.id);
    let user = user::ActiveModel {
      username: Set(identity.username.clone()),
      email: Set(identity.email.clone()),
      ..user.into()
    }
    .update(self.db)
    .await?;

    Ok(user)
  }

  async fn register(&self, identity: &Identity) -> Result<user::Model> {
    let now = self.clock.now();
    let txn = self.db.begin().await?;

    let user = user::ActiveModel {
      id: Set(self.ids.next_id()),
      discourse_id: Set(identity.discourse_id),
      username: Set(identity.username.clone()),
      email: Set(identity.email.clone()),
      created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    Entry::new(Kind::UserRegister)
      .user(user.id)
      .insert(&txn, self.ids, now)
      .await?;

    txn.commit().await?;
    info!("Registered user {} ({})", user.id, user.username);
    Ok(user)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{clock::SystemClock, entity::activity, testing};

  fn identity(discourse_id: i64) -> Identity {
    Identity {
      discourse_id,
      username: "raider".into(),
      email: "raider@example.com".into(),
      is_admin: false,
    }
  }

  #[tokio::test]
  async fn test_load_or_create_registers_once() {
    let db = testing::setup_db().await;
    let ids = Snowflake::new(0);
    let sv = User::new(&db, &ids, &SystemClock);

    let first = sv.load_or_create(&identity(77)).await.unwrap();
    let again = sv.load_or_create(&identity(77)).await.unwrap();

    assert_eq!(first.id, again.id);
    assert_eq!(user::Entity::find().count(&db).await.unwrap(), 1);

    let registrations = activity::Entity::find()
      .filter(activity::Column::Kind.eq(Kind::UserRegister))
      .count(&db)
      .await
      .unwrap();
    assert_eq!(registrations, 1);
  }

  #[tokio::test]
  async fn test_profile_is_refreshed() {
    let db = testing::setup_db().await;
    let ids = Snowflake::new(0);
    let sv = User::new(&db, &ids, &SystemClock);

    sv.load_or_create(&identity(5)).await.unwrap();

    let renamed = Identity {
      username: "renamed".into(),
      email: "new@example.com".into(),
      ..identity(5)
    };
    let user = sv.load_or_create(&renamed).await.unwrap();

    assert_eq!(user.username, "renamed");
    assert_eq!(
      sv.by_email("new@example.com").await.unwrap().map(|u| u.id),
      Some(user.id)
    );
  }
}
