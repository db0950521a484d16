use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use super::{
  auth::Admin,
  dto::{LicenseDto, SearchDto},
};
use crate::{
  entity::{Period, Tier},
  prelude::*,
  state::AppState,
  sv::ActiveUsers,
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
  #[serde(default)]
  pub q: String,
}

pub async fn search(
  State(app): State<Arc<AppState>>,
  _: Admin,
  Query(query): Query<SearchQuery>,
) -> Result<Json<SearchDto>> {
  let found = app.sv().search.run(&query.q).await?;
  Ok(Json(SearchDto::at(found, app.now())))
}

pub async fn active_users(
  State(app): State<Arc<AppState>>,
  _: Admin,
) -> Result<Json<ActiveUsers>> {
  Ok(Json(app.sv().sessions.active_users().await?))
}

#[derive(Debug, Deserialize)]
pub struct GrantReq {
  #[serde(default)]
  pub user_id: Option<i64>,
  #[serde(default)]
  pub user_email: Option<String>,
  pub duration: Period,
  #[serde(default)]
  pub tier: Option<Tier>,
}

pub async fn grant(
  State(app): State<Arc<AppState>>,
  Admin(auth): Admin,
  Json(req): Json<GrantReq>,
) -> Result<Json<LicenseDto>> {
  let sv = app.sv();

  let target = match (req.user_id, req.user_email.as_deref()) {
    (Some(id), _) if id != 0 => sv.user.by_id(id).await?,
    (_, Some(email)) if !email.is_empty() => sv.user.by_email(email).await?,
    _ => return Err(Error::MissingInput("user_id or user_email")),
  }
  .ok_or(Error::UserNotFound)?;

  let license = sv
    .payment
    .grant_manual(
      &auth.actor,
      target.id,
      req.duration,
      req.tier.unwrap_or_default(),
    )
    .await?;

  Ok(Json(LicenseDto::at(license, app.now())))
}

#[derive(Debug, Deserialize)]
pub struct RevokeReq {
  #[serde(default)]
  pub key: String,
}

pub async fn revoke(
  State(app): State<Arc<AppState>>,
  Admin(auth): Admin,
  Json(req): Json<RevokeReq>,
) -> Result<Json<LicenseDto>> {
  if req.key.is_empty() {
    return Err(Error::MissingInput("key"));
  }

  let license = app.sv().license.revoke(&req.key, &auth.actor).await?;
  Ok(Json(LicenseDto::at(license, app.now())))
}

#[derive(Debug, Deserialize)]
pub struct OffsetsReq {
  #[serde(default)]
  pub version: String,
  #[serde(default)]
  pub offsets: Option<json::Value>,
}

#[derive(Debug, Serialize)]
pub struct OffsetsRes {
  pub status: &'static str,
  pub message: &'static str,
}

pub async fn update_offsets(
  State(app): State<Arc<AppState>>,
  Admin(auth): Admin,
  Json(req): Json<OffsetsReq>,
) -> Result<Json<OffsetsRes>> {
  let offsets = req.offsets.unwrap_or_default();
  app.sv().offsets.update(&req.version, &offsets).await?;

  info!("Admin {} published offsets `{}`", auth.user.id, req.version);
  Ok(Json(OffsetsRes {
    status: "ok",
    message: "offsets updated successfully",
  }))
}
