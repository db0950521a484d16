//! Wire shapes of the JSON API, built from entities at the boundary

use serde::{Deserialize, Serialize};

use crate::{
  entity::{Period, Tier, license_key, payment, user},
  prelude::*,
  sv::{LicenseState, expiry, search::Found},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct UserDto {
  pub id: i64,
  pub discourse_id: i64,
  pub username: String,
  pub email: String,
  pub created_at: DateTime,
}

impl From<user::Model> for UserDto {
  fn from(user: user::Model) -> Self {
    Self {
      id: user.id,
      discourse_id: user.discourse_id,
      username: user.username,
      email: user.email,
      created_at: user.created_at,
    }
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LicenseDto {
  pub id: i64,
  pub key: String,
  pub duration: Period,
  pub tier: Tier,
  pub state: LicenseState,
  pub effective_from: Option<DateTime>,
  pub expires_at: Option<DateTime>,
  pub uses: i64,
  pub revoked: bool,
  pub user_id: i64,
  pub sandbox_mode: bool,
  pub created_at: DateTime,
}

impl LicenseDto {
  /// `state` depends on the time it is observed at
  pub fn at(license: license_key::Model, now: DateTime) -> Self {
    Self {
      state: LicenseState::of(&license, now),
      expires_at: license
        .effective_from
        .and_then(|from| expiry::expires_at(license.duration, from)),
      id: license.id,
      key: license.key,
      duration: license.duration,
      tier: license.tier,
      effective_from: license.effective_from,
      uses: license.uses,
      revoked: license.revoked,
      user_id: license.user_id,
      sandbox_mode: license.sandbox_mode,
      created_at: license.created_at,
    }
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentDto {
  pub id: i64,
  pub provider: payment::Provider,
  pub reference_id: String,
  pub amount_in_cents: i64,
  pub currency: String,
  pub sandbox_mode: bool,
  pub user_id: i64,
  pub license_key_id: Option<i64>,
  pub is_renewal: bool,
  pub license_duration: Period,
  pub billing_email: Option<String>,
  pub billing_name: Option<String>,
  pub created_at: DateTime,
}

impl From<payment::Model> for PaymentDto {
  fn from(payment: payment::Model) -> Self {
    Self {
      id: payment.id,
      provider: payment.provider,
      reference_id: payment.reference_id,
      amount_in_cents: payment.amount_in_cents,
      currency: payment.currency,
      sandbox_mode: payment.sandbox_mode,
      user_id: payment.user_id,
      license_key_id: payment.license_key_id,
      is_renewal: payment.is_renewal,
      license_duration: payment.license_duration,
      billing_email: payment.billing_email,
      billing_name: payment.billing_name,
      created_at: payment.created_at,
    }
  }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchDto {
  pub users: Vec<UserDto>,
  pub licenses: Vec<LicenseDto>,
  pub payments: Vec<PaymentDto>,
}

impl SearchDto {
  pub fn at(found: Found, now: DateTime) -> Self {
    Self {
      users: found.users.into_iter().map(Into::into).collect(),
      licenses: found
        .licenses
        .into_iter()
        .map(|license| LicenseDto::at(license, now))
        .collect(),
      payments: found.payments.into_iter().map(Into::into).collect(),
    }
  }
}
