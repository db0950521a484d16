use crate::{
  entity::{
    Period, Tier,
    activity::Kind,
    license_key,
    payment::{self, Provider},
  },
  error::is_unique_violation,
  prelude::*,
  sv::{self, Actor, activity::Entry},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
  NewLicense { duration: Period, tier: Tier },
  Renewal { license_id: i64 },
}

/// Completed payment as reported by a provider
#[derive(Debug, Clone)]
pub struct Capture {
  pub provider: Provider,
  pub reference_id: String,
  pub amount_in_cents: i64,
  pub currency: String,
  pub sandbox_mode: bool,
  pub user_id: i64,
  pub billing_email: Option<String>,
  pub billing_name: Option<String>,
  pub purpose: Purpose,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
  Issued(license_key::Model),
  Renewed(license_key::Model),
  AlreadyProcessed,
}

pub struct Payment<'a> {
  db: &'a DatabaseConnection,
  ids: &'a Snowflake,
  clock: &'a dyn Clock,
}

impl<'a> Payment<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    ids: &'a Snowflake,
    clock: &'a dyn Clock,
  ) -> Self {
    Self { db, ids, clock }
  }

  pub async fn by_reference(
    &self,
    reference_id: &str,
  ) -> Result<Option<payment::Model>> {
    let payment = payment::Entity::find()
      .filter(payment::Column::ReferenceId.eq(reference_id))
      .one(self.db)
      .await?;
    Ok(payment)
  }

  /// Records the payment and issues or renews its license, all or nothing.
  /// Delivering the same reference twice has no further effect.
  pub async fn intake(&self, capture: Capture) -> Result<Outcome> {
    if self.by_reference(&capture.reference_id).await?.is_some() {
      info!("Payment `{}` already processed", capture.reference_id);
      return Ok(Outcome::AlreadyProcessed);
    }

    self.record_once(capture).await
  }

  /// [`Self::record`] with the unique reference as the final guard, for
  /// deliveries that raced past the lookup in [`Self::intake`]
  async fn record_once(&self, capture: Capture) -> Result<Outcome> {
    let reference_id = capture.reference_id.clone();
    match self.record(capture).await {
      Err(Error::Database(err)) if is_unique_violation(&err) => {
        info!("Payment `{reference_id}` recorded concurrently");
        Ok(Outcome::AlreadyProcessed)
      }
      outcome => outcome,
    }
  }

  async fn record(&self, capture: Capture) -> Result<Outcome> {
    let now = self.clock.now();
    let txn = self.db.begin().await?;

    let (duration, target) = match capture.purpose {
      Purpose::NewLicense { duration, .. } => (duration, None),
      Purpose::Renewal { license_id } => {
        let license = license_key::Entity::find_by_id(license_id)
          .one(&txn)
          .await?
          .ok_or(Error::LicenseNotFound)?;
        if license.user_id != capture.user_id {
          warn!(
            "User {} paid for license {license_id} owned by {}",
            capture.user_id, license.user_id
          );
          return Err(Error::NoPermission);
        }
        (license.duration, Some(license.id))
      }
    };

    let payment = payment::ActiveModel {
      id: Set(self.ids.next_id()),
      provider: Set(capture.provider),
      reference_id: Set(capture.reference_id),
      amount_in_cents: Set(capture.amount_in_cents),
      currency: Set(capture.currency),
      sandbox_mode: Set(capture.sandbox_mode),
      user_id: Set(capture.user_id),
      license_key_id: Set(target),
      is_renewal: Set(target.is_some()),
      license_duration: Set(duration),
      billing_email: Set(capture.billing_email),
      billing_name: Set(capture.billing_name),
      created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let licenses = sv::License::new(&txn, self.ids, self.clock);
    let outcome = match capture.purpose {
      Purpose::NewLicense { duration, tier } => Outcome::Issued(
        licenses
          .generate(capture.user_id, payment.id, duration, tier, true)
          .await?,
      ),
      Purpose::Renewal { license_id } => Outcome::Renewed(
        licenses.renew(license_id, capture.user_id, payment.id, false).await?,
      ),
    };

    let license_id = match &outcome {
      Outcome::Issued(license) | Outcome::Renewed(license) => Some(license.id),
      Outcome::AlreadyProcessed => None,
    };
    let mut entry = Entry::new(Kind::PaymentReceived)
      .user(capture.user_id)
      .payment(payment.id);
    if let Some(id) = license_id {
      entry = entry.license(id);
    }
    entry.insert(&txn, self.ids, now).await?;

    txn.commit().await?;
    info!(
      "Payment `{}` of {} {} recorded",
      payment.reference_id, payment.amount_in_cents, payment.currency
    );
    Ok(outcome)
  }

  /// License handed out by an admin, backed by a zero-amount manual payment
  /// owned by the admin and referenced by its row id.
  pub async fn grant_manual(
    &self,
    admin: &Actor,
    user_id: i64,
    duration: Period,
    tier: Tier,
  ) -> Result<license_key::Model> {
    if !admin.is_admin {
      return Err(Error::Restricted);
    }
    if duration == Period::Unspecified {
      return Err(Error::MissingInput("duration"));
    }

    let now = self.clock.now();
    let id = self.ids.next_id();
    let txn = self.db.begin().await?;

    let payment = payment::ActiveModel {
      id: Set(id),
      provider: Set(Provider::Manual),
      reference_id: Set(format!("MANUAL-{}-{id}", admin.user_id)),
      amount_in_cents: Set(0),
      currency: Set(String::new()),
      sandbox_mode: Set(false),
      user_id: Set(admin.user_id),
      license_key_id: Set(None),
      is_renewal: Set(false),
      license_duration: Set(duration),
      billing_email: Set(None),
      billing_name: Set(None),
      created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let license = sv::License::new(&txn, self.ids, self.clock)
      .generate(user_id, payment.id, duration, tier, false)
      .await?;

    Entry::new(Kind::AdminLicenseCreation)
      .user(admin.user_id)
      .license(license.id)
      .payment(payment.id)
      .insert(&txn, self.ids, now)
      .await?;

    txn.commit().await?;
    info!(
      "Admin {} granted {duration} license {} to user {user_id}",
      admin.user_id, license.id
    );
    Ok(license)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    entity::activity,
    testing::{self, Fixture},
  };

  async fn fixture() -> Fixture {
    let fx = Fixture::new().await;
    testing::seed_user(&fx.db, 1).await;
    testing::seed_user(&fx.db, 42).await;
    fx
  }

  fn sv(fx: &Fixture) -> Payment<'_> {
    Payment::new(&fx.db, &fx.ids, fx.clock.as_ref())
  }

  fn capture(reference: &str, user_id: i64, purpose: Purpose) -> Capture {
    Capture {
      provider: Provider::Paypal,
      reference_id: reference.into(),
      amount_in_cents: 1900,
      currency: "EUR".into(),
      sandbox_mode: true,
      user_id,
      billing_email: Some("payer@example.com".into()),
      billing_name: None,
      purpose,
    }
  }

  const MONTH: Purpose =
    Purpose::NewLicense { duration: Period::OneMonth, tier: Tier::Premium };

  async fn payments(fx: &Fixture) -> u64 {
    payment::Entity::find().count(&fx.db).await.unwrap()
  }

  #[tokio::test]
  async fn test_new_license_is_issued_once() {
    let fx = fixture().await;

    let first = sv(&fx).intake(capture("CAP-1", 42, MONTH)).await.unwrap();
    let Outcome::Issued(license) = first else {
      panic!("expected a license, got {first:?}");
    };
    assert_eq!(license.user_id, 42);
    assert!(license.sandbox_mode);
    assert!(license.effective_from.is_some());

    let again = sv(&fx).intake(capture("CAP-1", 42, MONTH)).await.unwrap();
    assert_eq!(again, Outcome::AlreadyProcessed);

    assert_eq!(payments(&fx).await, 1);
    assert_eq!(license_key::Entity::find().count(&fx.db).await.unwrap(), 1);

    let received = activity::Entity::find()
      .filter(activity::Column::Kind.eq(Kind::PaymentReceived))
      .count(&fx.db)
      .await
      .unwrap();
    assert_eq!(received, 1);
  }

  #[tokio::test]
  async fn test_concurrent_delivery_is_absorbed() {
    let fx = fixture().await;

    let first = sv(&fx).record_once(capture("CAP-1", 42, MONTH)).await;
    assert!(matches!(first, Ok(Outcome::Issued(_))));

    // a second delivery that missed the lookup hits the unique reference
    let raced = sv(&fx).record_once(capture("CAP-1", 42, MONTH)).await;
    assert_eq!(raced.unwrap(), Outcome::AlreadyProcessed);

    assert_eq!(payments(&fx).await, 1);
    assert_eq!(license_key::Entity::find().count(&fx.db).await.unwrap(), 1);
  }

  #[tokio::test]
  async fn test_renewal_of_lapsed_license() {
    let fx = fixture().await;
    let Outcome::Issued(license) =
      sv(&fx).intake(capture("CAP-1", 42, MONTH)).await.unwrap()
    else {
      panic!("expected a license");
    };

    fx.clock.advance(TimeDelta::days(40));
    let renewal = Purpose::Renewal { license_id: license.id };
    let outcome = sv(&fx).intake(capture("CAP-2", 42, renewal)).await.unwrap();

    let Outcome::Renewed(renewed) = outcome else {
      panic!("expected a renewal, got {outcome:?}");
    };
    assert_eq!(renewed.id, license.id);
    assert_eq!(renewed.effective_from, Some(fx.clock.now()));

    let payment = sv(&fx).by_reference("CAP-2").await.unwrap().unwrap();
    assert!(payment.is_renewal);
    assert_eq!(payment.license_duration, Period::OneMonth);
    assert_eq!(payment.license_key_id, Some(license.id));

    let again = sv(&fx).intake(capture("CAP-2", 42, renewal)).await.unwrap();
    assert_eq!(again, Outcome::AlreadyProcessed);
    assert_eq!(payments(&fx).await, 2);
  }

  #[tokio::test]
  async fn test_renewal_by_other_user_is_rejected() {
    let fx = fixture().await;
    let Outcome::Issued(license) =
      sv(&fx).intake(capture("CAP-1", 42, MONTH)).await.unwrap()
    else {
      panic!("expected a license");
    };

    let renewal = Purpose::Renewal { license_id: license.id };
    assert!(matches!(
      sv(&fx).intake(capture("CAP-2", 1, renewal)).await,
      Err(Error::NoPermission)
    ));
    assert!(sv(&fx).by_reference("CAP-2").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_failed_renewal_rolls_back_payment() {
    let fx = fixture().await;
    let Outcome::Issued(license) =
      sv(&fx).intake(capture("CAP-1", 42, MONTH)).await.unwrap()
    else {
      panic!("expected a license");
    };

    let renewal = Purpose::Renewal { license_id: license.id };
    assert!(matches!(
      sv(&fx).intake(capture("CAP-2", 42, renewal)).await,
      Err(Error::LicenseNotYetExpired)
    ));

    assert!(sv(&fx).by_reference("CAP-2").await.unwrap().is_none());
    assert_eq!(payments(&fx).await, 1);

    // the same reference can be retried once the license lapses
    fx.clock.advance(TimeDelta::days(40));
    let outcome = sv(&fx).intake(capture("CAP-2", 42, renewal)).await.unwrap();
    assert!(matches!(outcome, Outcome::Renewed(_)));
  }

  #[tokio::test]
  async fn test_grant_manual() {
    let fx = fixture().await;
    let admin = Actor { user_id: 1, is_admin: true };

    let license = sv(&fx)
      .grant_manual(&admin, 42, Period::OneYear, Tier::Premium)
      .await
      .unwrap();
    assert_eq!(license.user_id, 42);
    assert_eq!(license.effective_from, None);

    let payment = payment::Entity::find()
      .filter(payment::Column::LicenseKeyId.eq(license.id))
      .one(&fx.db)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(payment.provider, Provider::Manual);
    assert_eq!(payment.user_id, 1);
    assert_eq!(payment.reference_id, format!("MANUAL-1-{}", payment.id));

    // grants within one instant still get distinct references
    sv(&fx)
      .grant_manual(&admin, 42, Period::OneYear, Tier::Premium)
      .await
      .unwrap();
    assert_eq!(payments(&fx).await, 2);

    let created = activity::Entity::find()
      .filter(activity::Column::Kind.eq(Kind::AdminLicenseCreation))
      .count(&fx.db)
      .await
      .unwrap();
    assert_eq!(created, 1);
  }

  #[tokio::test]
  async fn test_grant_manual_requires_admin() {
    let fx = fixture().await;
    let user = Actor { user_id: 42, is_admin: false };
    assert!(matches!(
      sv(&fx).grant_manual(&user, 42, Period::OneDay, Tier::Free).await,
      Err(Error::Restricted)
    ));

    let admin = Actor { user_id: 1, is_admin: true };
    assert!(matches!(
      sv(&fx).grant_manual(&admin, 42, Period::Unspecified, Tier::Free).await,
      Err(Error::MissingInput(_))
    ));
    assert_eq!(payments(&fx).await, 0);
  }
}
