use std::sync::Arc;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use super::{
  auth::Auth,
  dto::{LicenseDto, UserDto},
};
use crate::{
  entity::Period,
  paypal::{self, OrderMeta},
  prelude::*,
  state::AppState,
  sv::expiry,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionRes {
  pub user: UserDto,
  pub has_active_license: bool,
}

pub async fn session(
  State(app): State<Arc<AppState>>,
  auth: Auth,
) -> Result<Json<SessionRes>> {
  let has_active_license =
    app.sv().license.user_has_active(auth.user.id).await?;
  Ok(Json(SessionRes { user: auth.user.into(), has_active_license }))
}

pub async fn licenses(
  State(app): State<Arc<AppState>>,
  auth: Auth,
) -> Result<Json<Vec<LicenseDto>>> {
  let now = app.now();
  let licenses = app.sv().license.by_user(auth.user.id).await?;
  Ok(Json(
    licenses.into_iter().map(|license| LicenseDto::at(license, now)).collect(),
  ))
}

#[derive(Debug, Deserialize)]
pub struct CheckoutReq {
  #[serde(default)]
  pub license_duration: Option<Period>,
  #[serde(default)]
  pub renewal_key_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutRes {
  pub order_id: String,
  pub checkout_url: String,
}

/// Opens a PayPal order for a new license or for renewing a lapsed one
pub async fn checkout(
  State(app): State<Arc<AppState>>,
  auth: Auth,
  Json(req): Json<CheckoutReq>,
) -> Result<Json<CheckoutRes>> {
  let now = app.now();
  let renewal_of = req.renewal_key_id.filter(|id| *id > 0);

  let duration = match renewal_of {
    Some(license_id) => {
      let license = app
        .sv()
        .license
        .by_id(license_id)
        .await?
        .ok_or(Error::LicenseNotFound)?;

      if license.revoked {
        return Err(Error::LicenseRevoked);
      }
      if license.user_id != auth.user.id {
        return Err(Error::NoPermission);
      }
      if !expiry::is_expired(license.duration, license.effective_from, now) {
        return Err(Error::LicenseNotYetExpired);
      }
      license.duration
    }
    None => match req.license_duration {
      Some(period) if period != Period::Unspecified => period,
      _ => return Err(Error::MissingInput("license_duration")),
    },
  };

  if paypal::price_in_cents(duration).is_none() {
    return Err(Error::InvalidOperation("no price for this license duration"));
  }

  let paypal = app
    .paypal
    .as_ref()
    .ok_or_else(|| Error::Provider("PayPal is not configured".into()))?;

  let meta = OrderMeta {
    user_id: auth.user.id,
    duration,
    sandbox_mode: paypal.sandbox(),
    renewal_of,
  };
  let checkout = paypal.create_order(&meta).await?;

  info!("User {} opened PayPal order {}", auth.user.id, checkout.order_id);
  Ok(Json(CheckoutRes {
    order_id: checkout.order_id,
    checkout_url: checkout.checkout_url,
  }))
}
