use std::env;

use crate::{
  clock::SystemClock,
  kv::{KvStore, MemoryKv, RedisKv},
  paypal::{PayPal, PayPalConfig},
  prelude::*,
  sv,
};

#[derive(Debug, Clone)]
pub struct Config {
  pub database_url: String,
  /// In-memory session store when unset
  pub redis_url: Option<String>,
  pub port: u16,
  pub activate_secret: String,
  pub check_secret: String,
  pub sso_secret: String,
  pub session_ttl: Duration,
  pub cleanup_interval: Duration,
  pub snowflake_node: i64,
  pub paypal: Option<PayPalConfig>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      database_url: String::from("sqlite:licenses.db?mode=rwc"),
      redis_url: None,
      port: 3000,
      activate_secret: String::new(),
      check_secret: String::new(),
      sso_secret: String::new(),
      session_ttl: Duration::from_secs(24 * 60 * 60),
      cleanup_interval: Duration::from_secs(24 * 60 * 60),
      snowflake_node: 1,
      paypal: None,
    }
  }
}

fn required(name: &str) -> anyhow::Result<String> {
  env::var(name).with_context(|| format!("{name} not set"))
}

fn optional(name: &str) -> Option<String> {
  env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn duration(name: &str, default: Duration) -> anyhow::Result<Duration> {
  match optional(name) {
    Some(value) => humantime::parse_duration(&value)
      .with_context(|| format!("Invalid {name}: `{value}`")),
    None => Ok(default),
  }
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    let default = Self::default();

    let paypal = match optional("PAYPAL_CLIENT_ID") {
      Some(client_id) => Some(PayPalConfig {
        client_id,
        client_secret: required("PAYPAL_CLIENT_SECRET")?,
        webhook_id: required("PAYPAL_WEBHOOK_ID")?,
        sandbox: optional("PAYPAL_SANDBOX").is_none_or(|v| v != "false"),
        return_url: optional("PAYPAL_RETURN_URL")
          .unwrap_or_else(|| "http://localhost:5173/payment/success".into()),
        cancel_url: optional("PAYPAL_CANCEL_URL")
          .unwrap_or_else(|| "http://localhost:5173/purchase".into()),
      }),
      None => None,
    };

    Ok(Self {
      database_url: optional("DATABASE_URL").unwrap_or(default.database_url),
      redis_url: optional("REDIS_URL"),
      port: match optional("PORT") {
        Some(port) => port.parse().context("Invalid PORT")?,
        None => default.port,
      },
      activate_secret: required("ACTIVATE_SECRET")?,
      check_secret: required("CHECK_SECRET")?,
      sso_secret: required("DISCOURSE_SSO_SECRET")?,
      session_ttl: duration("SESSION_TTL", default.session_ttl)?,
      cleanup_interval: duration("CLEANUP_INTERVAL", default.cleanup_interval)?,
      snowflake_node: match optional("SNOWFLAKE_NODE") {
        Some(node) => node.parse().context("Invalid SNOWFLAKE_NODE")?,
        None => default.snowflake_node,
      },
      paypal,
    })
  }
}

pub struct Services<'a> {
  pub user: sv::User<'a>,
  pub license: sv::License<'a>,
  pub payment: sv::Payment<'a>,
  pub sessions: sv::Sessions<'a>,
  pub search: sv::Search<'a>,
  pub offsets: sv::Offsets<'a>,
}

pub struct AppState {
  pub db: DatabaseConnection,
  pub kv: Arc<dyn KvStore>,
  pub clock: Arc<dyn Clock>,
  pub ids: Snowflake,
  pub paypal: Option<PayPal>,
  pub config: Config,
}

impl AppState {
  pub async fn new(config: Config) -> anyhow::Result<Self> {
    info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
      .await
      .context("Failed to connect to database")?;

    info!("Running migrations...");
    Migrator::up(&db, None).await.context("Failed to run migrations")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let kv: Arc<dyn KvStore> = match &config.redis_url {
      Some(url) => Arc::new(
        RedisKv::connect(url).await.context("Failed to connect to Redis")?,
      ),
      None => {
        warn!("REDIS_URL not set, sessions are kept in memory");
        Arc::new(MemoryKv::new(clock.clone()))
      }
    };

    Ok(Self::with_parts(db, kv, clock, config))
  }

  pub fn with_parts(
    db: DatabaseConnection,
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    config: Config,
  ) -> Self {
    let paypal = config.paypal.clone().map(PayPal::new);
    if paypal.is_none() {
      warn!("PayPal is not configured, checkout and webhooks are disabled");
    }

    Self {
      db,
      kv,
      clock,
      ids: Snowflake::new(config.snowflake_node),
      paypal,
      config,
    }
  }

  pub fn now(&self) -> DateTime {
    self.clock.now()
  }

  pub fn sv(&self) -> Services<'_> {
    let clock = self.clock.as_ref();
    Services {
      user: sv::User::new(&self.db, &self.ids, clock),
      license: sv::License::new(&self.db, &self.ids, clock),
      payment: sv::Payment::new(&self.db, &self.ids, clock),
      sessions: sv::Sessions::new(
        self.kv.as_ref(),
        clock,
        self.config.session_ttl,
      ),
      search: sv::Search::new(&self.db),
      offsets: sv::Offsets::new(&self.db, &self.ids, clock),
    }
  }
}
