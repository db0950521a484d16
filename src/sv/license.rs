use sea_orm::QuerySelect;

use crate::{
  entity::{Period, Tier, activity::Kind, license_key, payment},
  error::is_unique_violation,
  prelude::*,
  sv::{Actor, activity::Entry, expiry, keygen},
};

pub struct License<'a, C = DatabaseConnection> {
  db: &'a C,
  ids: &'a Snowflake,
  clock: &'a dyn Clock,
}

/// Looks the key up and rejects it unless it is usable right now.
/// Unactivated licenses pass: their validity clock has not started.
async fn find_valid<D: ConnectionTrait>(
  db: &D,
  key: &str,
  now: DateTime,
) -> Result<license_key::Model> {
  let mut found = license_key::Entity::find()
    .filter(license_key::Column::Key.eq(key))
    .limit(2)
    .all(db)
    .await?;

  if found.len() > 1 {
    error!("Key `{key}` is shared by several licenses");
    return Err(Error::LicenseCollision);
  }
  let license = found.pop().ok_or(Error::LicenseNotFound)?;

  if license.revoked {
    return Err(Error::LicenseRevoked);
  }
  if expiry::is_expired(license.duration, license.effective_from, now) {
    return Err(Error::LicenseExpired);
  }

  Ok(license)
}

impl<'a, C> License<'a, C>
where
  C: ConnectionTrait + TransactionTrait,
{
  pub fn new(db: &'a C, ids: &'a Snowflake, clock: &'a dyn Clock) -> Self {
    Self { db, ids, clock }
  }

  pub async fn by_key(&self, key: &str) -> Result<Option<license_key::Model>> {
    let license = license_key::Entity::find()
      .filter(license_key::Column::Key.eq(key))
      .one(self.db)
      .await?;
    Ok(license)
  }

  pub async fn by_id(&self, id: i64) -> Result<Option<license_key::Model>> {
    Ok(license_key::Entity::find_by_id(id).one(self.db).await?)
  }

  pub async fn by_user(&self, user_id: i64) -> Result<Vec<license_key::Model>> {
    let licenses = license_key::Entity::find()
      .filter(license_key::Column::UserId.eq(user_id))
      .order_by_desc(license_key::Column::CreatedAt)
      .all(self.db)
      .await?;
    Ok(licenses)
  }

  pub async fn user_has_active(&self, user_id: i64) -> Result<bool> {
    let now = self.clock.now();
    let licenses = license_key::Entity::find()
      .filter(license_key::Column::UserId.eq(user_id))
      .filter(license_key::Column::Revoked.eq(false))
      .all(self.db)
      .await?;

    Ok(licenses.iter().any(|license| {
      !expiry::is_expired(license.duration, license.effective_from, now)
    }))
  }

  pub async fn validate(&self, key: &str) -> Result<license_key::Model> {
    find_valid(self.db, key, self.clock.now()).await
  }

  /// Starts the validity clock on first use and hands out a new usage id.
  /// Any usage id issued earlier stops matching.
  pub async fn activate(&self, key: &str) -> Result<license_key::Model> {
    let now = self.clock.now();
    let txn = self.db.begin().await?;

    let license = find_valid(&txn, key, now).await?;

    let effective_from = match license.effective_from {
      Some(from) if license.uses > 0 => from,
      _ => now,
    };
    let uses = license.uses + 1;

    let license = license_key::ActiveModel {
      effective_from: Set(Some(effective_from)),
      active_usage_id: Set(keygen::usage_id()?),
      uses: Set(uses),
      updated_at: Set(now),
      ..license.into()
    }
    .update(&txn)
    .await?;

    txn.commit().await?;
    debug!("License {} activated, uses: {}", license.id, license.uses);
    Ok(license)
  }

  /// Current use count if `usage_id` is the live session of the license
  pub async fn check(&self, key: &str, usage_id: &str) -> Result<i64> {
    let license = self.validate(key).await?;

    if license.active_usage_id.is_empty()
      || license.active_usage_id != usage_id
    {
      return Err(Error::InvalidUsageId);
    }

    Ok(license.uses)
  }

  pub async fn generate(
    &self,
    user_id: i64,
    payment_id: i64,
    duration: Period,
    tier: Tier,
    activate_now: bool,
  ) -> Result<license_key::Model> {
    let now = self.clock.now();
    let txn = self.db.begin().await?;

    let payment = payment::Entity::find_by_id(payment_id)
      .one(&txn)
      .await?
      .ok_or(Error::PaymentNotFound)?;

    let key = keygen::unique_key(&txn).await?;
    let license = license_key::ActiveModel {
      id: Set(self.ids.next_id()),
      key: Set(key),
      duration: Set(duration),
      tier: Set(tier),
      effective_from: Set(activate_now.then_some(now)),
      uses: Set(0),
      active_usage_id: Set(String::new()),
      revoked: Set(false),
      user_id: Set(user_id),
      sandbox_mode: Set(payment.sandbox_mode),
      created_at: Set(now),
      updated_at: Set(now),
    }
    .insert(&txn)
    .await
    .map_err(|err| {
      if is_unique_violation(&err) {
        Error::LicenseCollision
      } else {
        err.into()
      }
    })?;

    payment::ActiveModel {
      license_key_id: Set(Some(license.id)),
      ..payment.into()
    }
    .update(&txn)
    .await?;

    Entry::new(Kind::LicenseGeneration)
      .user(user_id)
      .license(license.id)
      .payment(payment_id)
      .insert(&txn, self.ids, now)
      .await?;

    txn.commit().await?;
    info!("Generated {duration} license {} for user {user_id}", license.id);
    Ok(license)
  }

  /// Restarts the validity window of a lapsed license. `force` lets a
  /// subscription renew a license that has not lapsed yet. The live usage
  /// id is cleared, so clients must activate again.
  pub async fn renew(
    &self,
    license_id: i64,
    user_id: i64,
    payment_id: i64,
    force: bool,
  ) -> Result<license_key::Model> {
    let now = self.clock.now();
    let txn = self.db.begin().await?;

    let license = license_key::Entity::find_by_id(license_id)
      .one(&txn)
      .await?
      .ok_or(Error::LicenseNotFound)?;

    if license.revoked {
      return Err(Error::LicenseRevoked);
    }
    if license.duration == Period::Lifetime {
      return Err(Error::InvalidOperation("lifetime licenses cannot be renewed"));
    }
    if !force
      && !expiry::is_expired(license.duration, license.effective_from, now)
    {
      return Err(Error::LicenseNotYetExpired);
    }

    let payment = payment::Entity::find_by_id(payment_id)
      .one(&txn)
      .await?
      .ok_or(Error::PaymentNotFound)?;
    payment::ActiveModel {
      license_key_id: Set(Some(license.id)),
      ..payment.into()
    }
    .update(&txn)
    .await?;

    let license = license_key::ActiveModel {
      effective_from: Set(Some(now)),
      active_usage_id: Set(String::new()),
      updated_at: Set(now),
      ..license.into()
    }
    .update(&txn)
    .await?;

    Entry::new(Kind::LicenseRenewal)
      .user(user_id)
      .license(license.id)
      .payment(payment_id)
      .insert(&txn, self.ids, now)
      .await?;

    txn.commit().await?;
    info!("Renewed license {} for user {user_id}", license.id);
    Ok(license)
  }

  /// Revocation is terminal. Only admins may revoke licenses they do not own.
  pub async fn revoke(
    &self,
    key: &str,
    actor: &Actor,
  ) -> Result<license_key::Model> {
    let now = self.clock.now();
    let txn = self.db.begin().await?;

    let license = license_key::Entity::find()
      .filter(license_key::Column::Key.eq(key))
      .one(&txn)
      .await?
      .ok_or(Error::LicenseNotFound)?;

    if !actor.is_admin && license.user_id != actor.user_id {
      return Err(Error::NoPermission);
    }
    if license.revoked {
      return Err(Error::AlreadyRevoked);
    }

    let license = license_key::ActiveModel {
      revoked: Set(true),
      updated_at: Set(now),
      ..license.into()
    }
    .update(&txn)
    .await?;

    let kind = if actor.is_admin {
      Kind::AdminLicenseRevocation
    } else {
      Kind::LicenseRevocation
    };
    Entry::new(kind)
      .user(actor.user_id)
      .license(license.id)
      .insert(&txn, self.ids, now)
      .await?;

    txn.commit().await?;
    info!("License {} revoked by user {}", license.id, actor.user_id);
    Ok(license)
  }
}
