//! Error types for the license server

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("Database error: {0}")]
  Database(#[from] DbErr),

  #[error("Session store error: {0}")]
  Store(#[from] redis::RedisError),

  #[error("Serialization error: {0}")]
  Json(#[from] json::Error),

  #[error("HTTP client error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("Payment provider error: {0}")]
  Provider(String),

  #[error("License not found")]
  LicenseNotFound,

  #[error("License key collision")]
  LicenseCollision,

  #[error("License revoked")]
  LicenseRevoked,

  #[error("License expired")]
  LicenseExpired,

  #[error("License not yet expired")]
  LicenseNotYetExpired,

  #[error("License already revoked")]
  AlreadyRevoked,

  #[error("Invalid usage id")]
  InvalidUsageId,

  #[error("Invalid operation: {0}")]
  InvalidOperation(&'static str),

  #[error("Random generation failed: {0}")]
  RandomGeneration(String),

  #[error("No unique license key after {0} attempts")]
  KeyExhausted(usize),

  #[error("Payment not found")]
  PaymentNotFound,

  #[error("User not found")]
  UserNotFound,

  #[error("Session not found")]
  SessionNotFound,

  #[error("Missing input: {0}")]
  MissingInput(&'static str),

  #[error("Unauthorized: {0}")]
  Unauthorized(&'static str),

  #[error("Restricted area")]
  Restricted,

  #[error("No permission")]
  NoPermission,

  #[error("Internal error: {0}")]
  Internal(String),
}

impl Error {
  /// Expected outcome of validating user input or license state,
  /// as opposed to a failure of the server or one of its backends.
  pub fn is_expected(&self) -> bool {
    !matches!(
      self,
      Error::Database(_)
        | Error::Store(_)
        | Error::Json(_)
        | Error::Http(_)
        | Error::Provider(_)
        | Error::RandomGeneration(_)
        | Error::KeyExhausted(_)
        | Error::LicenseCollision
        | Error::Internal(_)
    )
  }

  /// Message safe to show to the client
  pub fn user_message(&self) -> String {
    if self.is_expected() { self.to_string() } else { "Internal error".into() }
  }

  fn status(&self) -> StatusCode {
    match self {
      Error::LicenseNotFound
      | Error::PaymentNotFound
      | Error::UserNotFound
      | Error::SessionNotFound => StatusCode::NOT_FOUND,
      Error::LicenseRevoked
      | Error::LicenseExpired
      | Error::InvalidUsageId
      | Error::Restricted
      | Error::NoPermission => StatusCode::FORBIDDEN,
      Error::LicenseNotYetExpired | Error::AlreadyRevoked => {
        StatusCode::CONFLICT
      }
      Error::InvalidOperation(_) | Error::MissingInput(_) => {
        StatusCode::BAD_REQUEST
      }
      Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      Error::Provider(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

/// `true` when the statement failed on a unique index
pub fn is_unique_violation(err: &DbErr) -> bool {
  matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    if !self.is_expected() {
      tracing::error!("Request failed: {self}");
    }

    let body = json::json!({
      "success": false,
      "error": self.user_message(),
    });

    (self.status(), axum::Json(body)).into_response()
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
