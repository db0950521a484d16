pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_users;
mod m20250301_000002_create_payments;
mod m20250301_000003_create_license_keys;
mod m20250301_000004_create_activities;
mod m20250301_000005_create_offsets;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20250301_000001_create_users::Migration),
      Box::new(m20250301_000002_create_payments::Migration),
      Box::new(m20250301_000003_create_license_keys::Migration),
      Box::new(m20250301_000004_create_activities::Migration),
      Box::new(m20250301_000005_create_offsets::Migration),
    ]
  }
}
