mod admin;
mod auth;
mod dto;
mod handlers;
mod user;
mod webhook;

use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use axum::{
  Router,
  routing::{get, post},
};
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

use crate::{prelude::*, state::AppState};

pub fn router(app: Arc<AppState>) -> Router {
  Router::new()
    .route("/health", get(handlers::health))
    .route("/license/activate", post(handlers::activate))
    .route("/license/check", post(handlers::check))
    .route("/api/admin/search", get(admin::search))
    .route("/api/admin/active-users", get(admin::active_users))
    .route("/api/admin/licenses", post(admin::grant))
    .route("/api/admin/licenses/revoke", post(admin::revoke))
    .route("/offsets/update", post(admin::update_offsets))
    .route("/api/user/session", get(user::session))
    .route("/api/user/licenses", get(user::licenses))
    .route("/api/payment/paypal/checkout", post(user::checkout))
    .route("/api/webhooks/paypal", post(webhook::paypal))
    .with_state(app)
}

pub struct Plugin;

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let governor_conf = Arc::new(
      GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(100)
        .finish()
        .context("Failed to build rate limiter config")?,
    );

    let limiter = governor_conf.limiter().clone();
    let addr = SocketAddr::from(([0, 0, 0, 0], app.config.port));

    let router = router(app)
      .layer(
        ServiceBuilder::new()
          .layer(TraceLayer::new_for_http())
          .layer(GovernorLayer::new(governor_conf))
          .layer(
            CorsLayer::new()
              .allow_origin(Any)
              .allow_methods(Any)
              .allow_headers(Any),
          ),
      )
      .into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(addr)
      .await
      .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HTTP Server listening on {addr}");

    let limiter = async {
      loop {
        time::sleep(Duration::from_secs(60)).await;
        limiter.retain_recent();
      }
    };

    let server = async {
      axum::serve(listener, router).await.context("Axum server error")
    };

    tokio::select! {
      result = server => {
        match &result {
          Ok(_) => info!("Server stopped gracefully"),
          Err(err) => error!("Server stopped with error: {err}"),
        }
        result
      }
      _ = limiter => {
        error!("Rate limiter cleaner stopped unexpectedly!");
        Ok(())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
  };
  use tower::ServiceExt;

  use super::{handlers::LicenseRes, *};
  use crate::{
    entity::{Period, Tier},
    testing::{self, ACTIVATE_SECRET, CHECK_SECRET, SSO_SECRET},
  };

  const ADMIN: &str =
    "external_id=900&username=boss&email=boss@example.com&admin=true";
  const USER: &str = "external_id=42&username=user42&email=user42@example.com";

  fn request(
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<json::Value>,
  ) -> Request<Body> {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(query) = auth {
      req = req.header(header::AUTHORIZATION, auth::sign(query, SSO_SECRET));
    }
    match body {
      Some(body) => req
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => req.body(Body::empty()).unwrap(),
    }
  }

  async fn call(
    app: &Arc<AppState>,
    req: Request<Body>,
  ) -> (StatusCode, Vec<u8>) {
    let res = router(app.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
  }

  async fn client(
    app: &Arc<AppState>,
    uri: &str,
    body: json::Value,
  ) -> LicenseRes {
    let (status, body) =
      call(app, request("POST", uri, None, Some(body))).await;
    assert_eq!(status, StatusCode::OK);
    json::from_slice(&body).unwrap()
  }

  async fn paid_license(app: &Arc<AppState>, duration: Period) -> String {
    testing::seed_user(&app.db, 42).await;
    testing::seed_payment(&app.db, 7, 42).await;
    let license = app
      .sv()
      .license
      .generate(42, 7, duration, Tier::Premium, false)
      .await
      .unwrap();
    license.key
  }

  #[tokio::test]
  async fn test_health() {
    let (app, _) = testing::test_state().await;
    let (status, body) =
      call(&app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
  }

  #[tokio::test]
  async fn test_wrong_secret_is_silent() {
    let (app, _) = testing::test_state().await;

    for uri in ["/license/activate", "/license/check"] {
      let body = json::json!({ "license_key": "", "secret": "guess" });
      let (status, body) =
        call(&app, request("POST", uri, None, Some(body))).await;
      assert_eq!(status, StatusCode::OK);
      assert!(body.is_empty());
    }
  }

  #[tokio::test]
  async fn test_free_tier() {
    let (app, clock) = testing::test_state().await;

    let res = client(
      &app,
      "/license/activate",
      json::json!({ "license_key": "", "secret": ACTIVATE_SECRET }),
    )
    .await;
    assert_eq!(res.status, "ok");
    assert_eq!(res.uses, 1);
    assert_eq!(res.usage_id.len(), 32);
    assert!(!res.timestamp.is_empty());

    let check = |usage_id: &str| {
      json::json!({ "usage_id": usage_id, "secret": CHECK_SECRET })
    };

    let ok = client(&app, "/license/check", check(&res.usage_id)).await;
    assert_eq!((ok.status.as_str(), ok.uses), ("ok", 1));

    let missing = client(&app, "/license/check", check("")).await;
    assert_eq!(missing.status, "fault");
    assert_eq!(missing.fault_string, "Missing usage id");

    let unknown = client(&app, "/license/check", check("nope")).await;
    assert_eq!(unknown.fault_string, "Invalid or expired free tier session");

    clock.advance(TimeDelta::hours(25));
    let lapsed = client(&app, "/license/check", check(&res.usage_id)).await;
    assert_eq!(lapsed.status, "fault");
  }

  #[tokio::test]
  async fn test_paid_tier() {
    let (app, _) = testing::test_state().await;
    let key = paid_license(&app, Period::OneMonth).await;

    let res = client(
      &app,
      "/license/activate",
      json::json!({ "license_key": key, "secret": ACTIVATE_SECRET }),
    )
    .await;
    assert_eq!(res.status, "ok");
    assert_eq!(res.uses, 1);
    assert_eq!(app.sv().sessions.active_users().await.unwrap().paid, 1);

    let check = |usage_id: &str| {
      json::json!({
        "license_key": key,
        "usage_id": usage_id,
        "secret": CHECK_SECRET,
      })
    };

    let ok = client(&app, "/license/check", check(&res.usage_id)).await;
    assert_eq!((ok.status.as_str(), ok.uses), ("ok", 1));

    let wrong = client(&app, "/license/check", check("wrong-id")).await;
    assert_eq!(wrong.status, "fault");
    assert_eq!(wrong.fault_string, "Invalid usage id");
  }

  #[tokio::test]
  async fn test_license_faults() {
    let (app, clock) = testing::test_state().await;
    let key = paid_license(&app, Period::OneDay).await;

    let activate = |key: &str| {
      json::json!({ "license_key": key, "secret": ACTIVATE_SECRET })
    };

    let unknown = client(&app, "/license/activate", activate("missing")).await;
    assert_eq!(unknown.status, "fault");
    assert_eq!(unknown.fault_string, "License not found");

    client(&app, "/license/activate", activate(&key)).await;
    clock.advance(TimeDelta::days(2));

    let expired = client(&app, "/license/activate", activate(&key)).await;
    assert_eq!(expired.fault_string, "License expired");
  }

  #[tokio::test]
  async fn test_admin_area_is_gated() {
    let (app, _) = testing::test_state().await;
    let uri = "/api/admin/active-users";

    let (status, _) = call(&app, request("GET", uri, None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, request("GET", uri, Some(USER), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) =
      call(&app, request("GET", uri, Some(ADMIN), None)).await;
    assert_eq!(status, StatusCode::OK);
    let counts: json::Value = json::from_slice(&body).unwrap();
    assert_eq!(counts["total"], 0);
  }

  #[tokio::test]
  async fn test_admin_grant_search_revoke() {
    let (app, _) = testing::test_state().await;
    testing::seed_user(&app.db, 42).await;

    let grant = json::json!({
      "user_email": "user42@example.com",
      "duration": "ONE_MONTH",
    });
    let (status, body) = call(
      &app,
      request("POST", "/api/admin/licenses", Some(ADMIN), Some(grant)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let license: json::Value = json::from_slice(&body).unwrap();
    assert_eq!(license["user_id"], 42);
    assert_eq!(license["state"], "UNACTIVATED");
    assert_eq!(license["tier"], "PREMIUM");
    let key = license["key"].as_str().unwrap().to_string();

    let uri = format!("/api/admin/search?q={key}");
    let (status, body) =
      call(&app, request("GET", &uri, Some(ADMIN), None)).await;
    assert_eq!(status, StatusCode::OK);
    let found: json::Value = json::from_slice(&body).unwrap();
    assert_eq!(found["licenses"].as_array().unwrap().len(), 1);

    let revoke = json::json!({ "key": key });
    let uri = "/api/admin/licenses/revoke";
    let (status, body) = call(
      &app,
      request("POST", uri, Some(ADMIN), Some(revoke.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let revoked: json::Value = json::from_slice(&body).unwrap();
    assert_eq!(revoked["state"], "REVOKED");

    let (status, _) =
      call(&app, request("POST", uri, Some(ADMIN), Some(revoke))).await;
    assert_eq!(status, StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn test_offsets_update() {
    let (app, _) = testing::test_state().await;
    let uri = "/offsets/update";
    let body = json::json!({ "version": "2.4.1", "offsets": { "hp": 16 } });

    let (status, _) =
      call(&app, request("POST", uri, Some(USER), Some(body.clone()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, res) =
      call(&app, request("POST", uri, Some(ADMIN), Some(body))).await;
    assert_eq!(status, StatusCode::OK);
    let res: json::Value = json::from_slice(&res).unwrap();
    assert_eq!(res["status"], "ok");

    let stored = app.sv().offsets.by_version("2.4.1").await.unwrap().unwrap();
    assert_eq!(stored.data, r#"{"hp":16}"#);

    for body in [
      json::json!({ "offsets": { "hp": 16 } }),
      json::json!({ "version": "2.4.1" }),
    ] {
      let (status, _) =
        call(&app, request("POST", uri, Some(ADMIN), Some(body))).await;
      assert_eq!(status, StatusCode::BAD_REQUEST);
    }
  }

  #[tokio::test]
  async fn test_grant_needs_target() {
    let (app, _) = testing::test_state().await;

    let grant = json::json!({ "user_id": 12345, "duration": "ONE_DAY" });
    let (status, _) = call(
      &app,
      request("POST", "/api/admin/licenses", Some(ADMIN), Some(grant)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let grant = json::json!({ "duration": "ONE_DAY" });
    let (status, _) = call(
      &app,
      request("POST", "/api/admin/licenses", Some(ADMIN), Some(grant)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn test_user_session_and_licenses() {
    let (app, _) = testing::test_state().await;

    let (status, body) =
      call(&app, request("GET", "/api/user/session", Some(USER), None)).await;
    assert_eq!(status, StatusCode::OK);
    let session: json::Value = json::from_slice(&body).unwrap();
    assert_eq!(session["user"]["discourse_id"], 42);
    assert_eq!(session["has_active_license"], false);

    let (status, body) =
      call(&app, request("GET", "/api/user/licenses", Some(USER), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"[]");
  }

  #[tokio::test]
  async fn test_checkout_rules() {
    let (app, _) = testing::test_state().await;
    let uri = "/api/payment/paypal/checkout";

    let (status, _) =
      call(&app, request("POST", uri, Some(USER), Some(json::json!({}))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let day = json::json!({ "license_duration": "ONE_DAY" });
    let (status, _) =
      call(&app, request("POST", uri, Some(USER), Some(day))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // priced, but no PayPal credentials in tests
    let month = json::json!({ "license_duration": "ONE_MONTH" });
    let (status, _) =
      call(&app, request("POST", uri, Some(USER), Some(month))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let renewal = json::json!({ "renewal_key_id": 1 });
    let (status, _) =
      call(&app, request("POST", uri, Some(USER), Some(renewal))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn test_webhook_without_paypal() {
    let (app, _) = testing::test_state().await;
    let event = json::json!({ "event_type": "PAYMENT.CAPTURE.COMPLETED" });
    let (status, _) = call(
      &app,
      request("POST", "/api/webhooks/paypal", None, Some(event)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
  }
}
