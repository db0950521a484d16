//! Shared fixtures for the unit tests

use sea_orm::ConnectOptions;

use crate::{
  clock::ManualClock,
  entity::{
    Period,
    payment::{self, Provider},
    user,
  },
  kv::MemoryKv,
  prelude::*,
  state::{AppState, Config},
};

/// Fresh in-memory database with every migration applied.
/// A single pooled connection keeps all queries on the same database.
pub async fn setup_db() -> DatabaseConnection {
  let mut opts = ConnectOptions::new("sqlite::memory:");
  opts.max_connections(1).min_connections(1).sqlx_logging(false);

  let db = Database::connect(opts).await.unwrap();
  Migrator::up(&db, None).await.unwrap();
  db
}

pub async fn seed_user(db: &DatabaseConnection, id: i64) -> user::Model {
  user::ActiveModel {
    id: Set(id),
    discourse_id: Set(id),
    username: Set(format!("user{id}")),
    email: Set(format!("user{id}@example.com")),
    created_at: Set(Utc::now().naive_utc()),
  }
  .insert(db)
  .await
  .unwrap()
}

pub async fn seed_payment(
  db: &DatabaseConnection,
  id: i64,
  user_id: i64,
) -> payment::Model {
  payment::ActiveModel {
    id: Set(id),
    provider: Set(Provider::Manual),
    reference_id: Set(format!("ref-{id}")),
    amount_in_cents: Set(0),
    currency: Set("EUR".into()),
    sandbox_mode: Set(false),
    user_id: Set(user_id),
    license_key_id: Set(None),
    is_renewal: Set(false),
    license_duration: Set(Period::Unspecified),
    billing_email: Set(None),
    billing_name: Set(None),
    created_at: Set(Utc::now().naive_utc()),
  }
  .insert(db)
  .await
  .unwrap()
}

pub struct Fixture {
  pub db: DatabaseConnection,
  pub ids: Snowflake,
  pub clock: Arc<ManualClock>,
}

impl Fixture {
  pub async fn new() -> Self {
    Self {
      db: setup_db().await,
      ids: Snowflake::new(0),
      clock: Arc::new(ManualClock::new()),
    }
  }
}

pub const ACTIVATE_SECRET: &str = "activate-secret";
pub const CHECK_SECRET: &str = "check-secret";
pub const SSO_SECRET: &str = "sso-secret";

/// Application state over an in-memory database and session store,
/// driven by the returned clock
pub async fn test_state() -> (Arc<AppState>, Arc<ManualClock>) {
  let clock = Arc::new(ManualClock::new());
  let config = Config {
    activate_secret: ACTIVATE_SECRET.into(),
    check_secret: CHECK_SECRET.into(),
    sso_secret: SSO_SECRET.into(),
    ..Config::default()
  };

  let kv = Arc::new(MemoryKv::new(clock.clone()));
  let app = AppState::with_parts(setup_db().await, kv, clock.clone(), config);
  (Arc::new(app), clock)
}
