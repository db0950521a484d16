//! Client endpoints polled by the shipped application.
//!
//! License-state failures are answered with `status: "fault"` and a 200.
//! A wrong shared secret gets an empty 200 so probing learns nothing.

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
  response::{IntoResponse, Response},
};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::{prelude::*, state::AppState};

const OK: &str = "ok";
const FAULT: &str = "fault";

#[derive(Debug, Deserialize)]
pub struct ActivateReq {
  #[serde(default)]
  pub license_key: String,
  #[serde(default)]
  pub secret: String,
  #[serde(default)]
  pub ip: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckReq {
  #[serde(default)]
  pub license_key: String,
  #[serde(default)]
  pub usage_id: String,
  #[serde(default)]
  pub secret: String,
  #[serde(default)]
  pub ip: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LicenseRes {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub status: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub usage_id: String,
  #[serde(default, skip_serializing_if = "is_zero")]
  pub uses: i64,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub fault_string: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub timestamp: String,
}

fn is_zero(uses: &i64) -> bool {
  *uses == 0
}

impl LicenseRes {
  fn at(now: DateTime) -> Self {
    Self {
      timestamp: now.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true),
      ..Default::default()
    }
  }

  fn ok(self, usage_id: String, uses: i64) -> Self {
    Self { status: OK.into(), usage_id, uses, ..self }
  }

  fn fault(self, message: impl Into<String>) -> Self {
    Self { status: FAULT.into(), fault_string: message.into(), ..self }
  }
}

/// Expected failures become a fault payload, the rest a 500
fn fault_or_fail(res: LicenseRes, err: Error) -> Result<Response> {
  if err.is_expected() {
    Ok(Json(res.fault(err.to_string())).into_response())
  } else {
    Err(err)
  }
}

pub async fn activate(
  State(app): State<Arc<AppState>>,
  Json(req): Json<ActivateReq>,
) -> Result<Response> {
  if req.secret != app.config.activate_secret {
    debug!("Activation with a wrong secret from `{}`", req.ip);
    return Ok(().into_response());
  }

  let sv = app.sv();
  let res = LicenseRes::at(app.now());

  if req.license_key.is_empty() {
    return Ok(match sv.sessions.create_free_session().await {
      // free tier has no counter
      Ok(usage_id) => Json(res.ok(usage_id, 1)),
      Err(err) => {
        error!("Failed to create free session: {err}");
        Json(res.fault("Failed to create free session"))
      }
    }
    .into_response());
  }

  let license = match sv.license.activate(&req.license_key).await {
    Ok(license) => license,
    Err(err) => return fault_or_fail(res, err),
  };

  let tracked = sv.sessions.track_paid_session(&license.active_usage_id).await;
  if let Err(err) = tracked {
    warn!("Failed to track paid session of license {}: {err}", license.id);
  }

  Ok(Json(res.ok(license.active_usage_id, license.uses)).into_response())
}

pub async fn check(
  State(app): State<Arc<AppState>>,
  Json(req): Json<CheckReq>,
) -> Result<Response> {
  if req.secret != app.config.check_secret {
    debug!("Check with a wrong secret from `{}`", req.ip);
    return Ok(().into_response());
  }

  let sv = app.sv();
  let res = LicenseRes::at(app.now());

  if req.license_key.is_empty() {
    if req.usage_id.is_empty() {
      return Ok(Json(res.fault("Missing usage id")).into_response());
    }

    return Ok(match sv.sessions.validate_free_session(&req.usage_id).await {
      Ok(()) => Json(res.ok(String::new(), 1)),
      Err(err) => {
        debug!("Free session `{}` rejected: {err}", req.usage_id);
        Json(res.fault("Invalid or expired free tier session"))
      }
    }
    .into_response());
  }

  let uses = match sv.license.check(&req.license_key, &req.usage_id).await {
    Ok(uses) => uses,
    Err(err) => return fault_or_fail(res, err),
  };

  if let Err(err) = sv.sessions.track_paid_session(&req.usage_id).await {
    warn!("Failed to refresh paid session: {err}");
  }

  Ok(Json(res.ok(String::new(), uses)).into_response())
}

pub async fn health() -> &'static str {
  "OK"
}
