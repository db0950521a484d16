//! Forum SSO bearer tokens: `Authorization: Bearer SSO_<payload>.<sig>`.
//!
//! `payload` is the base64 query string signed by the forum, `sig` is the
//! hex HMAC-SHA256 of the payload under the shared SSO secret.

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use base64::{Engine, prelude::BASE64_STANDARD};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::{
  entity::user,
  prelude::*,
  state::AppState,
  sv::{Actor, Identity},
};

type HmacSha256 = Hmac<Sha256>;

const PREFIX: &str = "SSO_";

#[derive(Deserialize)]
struct Payload {
  #[serde(default)]
  external_id: String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  email: String,
  #[serde(default)]
  admin: String,
}

pub fn verify_sso(payload: &str, sig: &str, secret: &str) -> Result<Identity> {
  let sig = hex::decode(sig).map_err(|_| Error::Unauthorized("bad signature"))?;

  let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
    .map_err(|err| Error::Internal(err.to_string()))?;
  mac.update(payload.as_bytes());
  mac.verify_slice(&sig).map_err(|_| Error::Unauthorized("bad signature"))?;

  let decoded = BASE64_STANDARD
    .decode(payload)
    .map_err(|_| Error::Unauthorized("malformed payload"))?;
  let payload: Payload = serde_urlencoded::from_bytes(&decoded)
    .map_err(|_| Error::Unauthorized("malformed payload"))?;

  let discourse_id = payload
    .external_id
    .parse::<i64>()
    .map_err(|_| Error::Unauthorized("malformed payload"))?;
  if discourse_id == 0 || payload.username.is_empty() || payload.email.is_empty()
  {
    return Err(Error::Unauthorized("incomplete user info"));
  }

  Ok(Identity {
    discourse_id,
    username: payload.username,
    email: payload.email,
    is_admin: payload.admin == "true",
  })
}

pub fn identity_from_header(header: &str, secret: &str) -> Result<Identity> {
  let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
  let token = token
    .strip_prefix(PREFIX)
    .ok_or(Error::Unauthorized("unsupported token"))?;

  let (payload, sig) =
    token.split_once('.').ok_or(Error::Unauthorized("invalid token"))?;
  if sig.contains('.') {
    return Err(Error::Unauthorized("invalid token"));
  }

  // the payload may arrive url-encoded
  let payload = urlencoding::decode(payload)
    .map(|decoded| decoded.into_owned())
    .unwrap_or_else(|_| payload.to_string());

  verify_sso(&payload, sig, secret)
}

/// Signed-in user, created locally on first sight
pub struct Auth {
  pub user: user::Model,
  pub actor: Actor,
}

impl FromRequestParts<Arc<AppState>> for Auth {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    app: &Arc<AppState>,
  ) -> Result<Self> {
    let header = parts
      .headers
      .get(axum::http::header::AUTHORIZATION)
      .and_then(|value| value.to_str().ok())
      .ok_or(Error::Unauthorized("missing token"))?;

    let identity = identity_from_header(header, &app.config.sso_secret)?;
    let user = app.sv().user.load_or_create(&identity).await?;

    let actor = Actor { user_id: user.id, is_admin: identity.is_admin };
    Ok(Self { user, actor })
  }
}

/// [`Auth`] that carries the admin flag
pub struct Admin(pub Auth);

impl FromRequestParts<Arc<AppState>> for Admin {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    app: &Arc<AppState>,
  ) -> Result<Self> {
    let auth = Auth::from_request_parts(parts, app).await?;
    if !auth.actor.is_admin {
      warn!("User {} tried to reach the admin area", auth.user.id);
      return Err(Error::Restricted);
    }
    Ok(Self(auth))
  }
}

#[cfg(test)]
pub fn sign(query: &str, secret: &str) -> String {
  let payload = BASE64_STANDARD.encode(query);
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
  mac.update(payload.as_bytes());
  let sig = hex::encode(mac.finalize().into_bytes());
  format!("Bearer {PREFIX}{}.{sig}", urlencoding::encode(&payload))
}
