//! License server for the EB2 desktop application.
//!
//! - SeaORM over SQLite for users, licenses, payments and the activity log
//! - Redis (or an in-process map) for free and paid usage sessions
//! - Axum for the client, user, admin and PayPal webhook endpoints

mod clock;
mod entity;
mod error;
mod kv;
mod paypal;
mod plugins;
mod prelude;
mod snowflake;
mod state;
mod sv;
#[cfg(test)]
mod testing;

use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  plugins::{App, cron, server},
  prelude::*,
  state::{AppState, Config},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "licensor=debug,tower_http=debug,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  info!("Starting License Server v{}", env!("CARGO_PKG_VERSION"));

  let config = Config::from_env().context("Failed to load configuration")?;
  let app = Arc::new(AppState::new(config).await?);

  let handles = App::new()
    .register(server::Plugin)
    .register(cron::SessionCleanup)
    .register(cron::PurgeExpired)
    .run(app);

  tokio::signal::ctrl_c().await.context("Failed to listen for ctrl-c")?;
  info!("Shutting down...");

  for handle in handles {
    handle.abort();
  }
  Ok(())
}
