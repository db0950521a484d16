use sea_orm::{Condition, QuerySelect};
use serde::Serialize;

use crate::{
  entity::{license_key, payment, user},
  prelude::*,
};

const LIMIT: u64 = 100;

#[derive(Debug, Default, Serialize)]
pub struct Found {
  pub users: Vec<user::Model>,
  pub licenses: Vec<license_key::Model>,
  pub payments: Vec<payment::Model>,
}

/// Exact-match lookup across users, licenses and payments.
/// A numeric term also matches ids and foreign keys.
pub struct Search<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Search<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn run(&self, term: &str) -> Result<Found> {
    let term = term.trim();
    if term.is_empty() {
      return Err(Error::MissingInput("search term"));
    }
    let id = term.parse::<i64>().ok();

    let mut users = Condition::any().add(user::Column::Email.eq(term));
    let mut licenses = Condition::any()
      .add(license_key::Column::Key.eq(term))
      .add(license_key::Column::ActiveUsageId.eq(term));
    let mut payments = Condition::any()
      .add(payment::Column::ReferenceId.eq(term))
      .add(payment::Column::BillingEmail.eq(term))
      .add(payment::Column::BillingName.eq(term))
      .add(payment::Column::Currency.eq(term));

    if let Some(id) = id {
      users = users
        .add(user::Column::Id.eq(id))
        .add(user::Column::DiscourseId.eq(id));
      licenses = licenses
        .add(license_key::Column::Id.eq(id))
        .add(license_key::Column::UserId.eq(id));
      payments = payments
        .add(payment::Column::Id.eq(id))
        .add(payment::Column::UserId.eq(id))
        .add(payment::Column::LicenseKeyId.eq(id));
    }

    Ok(Found {
      users: user::Entity::find()
        .filter(users)
        .limit(LIMIT)
        .all(self.db)
        .await?,
      licenses: license_key::Entity::find()
        .filter(licenses)
        .order_by_desc(license_key::Column::CreatedAt)
        .limit(LIMIT)
        .all(self.db)
        .await?,
      payments: payment::Entity::find()
        .filter(payments)
        .order_by_desc(payment::Column::CreatedAt)
        .limit(LIMIT)
        .all(self.db)
        .await?,
    })
  }
}
