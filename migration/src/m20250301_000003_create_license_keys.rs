use sea_orm_migration::prelude::*;

use super::m20250301_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(LicenseKeys::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(LicenseKeys::Id)
              .big_integer()
              .not_null()
              .primary_key(),
          )
          .col(
            ColumnDef::new(LicenseKeys::Key).string().not_null().unique_key(),
          )
          .col(ColumnDef::new(LicenseKeys::Duration).string().not_null())
          .col(
            ColumnDef::new(LicenseKeys::Tier)
              .string()
              .not_null()
              .default("PREMIUM"),
          )
          .col(ColumnDef::new(LicenseKeys::EffectiveFrom).date_time().null())
          .col(
            ColumnDef::new(LicenseKeys::Uses)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(LicenseKeys::ActiveUsageId)
              .string()
              .not_null()
              .default(""),
          )
          .col(
            ColumnDef::new(LicenseKeys::Revoked)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(ColumnDef::new(LicenseKeys::UserId).big_integer().not_null())
          .col(
            ColumnDef::new(LicenseKeys::SandboxMode)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(ColumnDef::new(LicenseKeys::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(LicenseKeys::UpdatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_license_keys_user")
              .from(LicenseKeys::Table, LicenseKeys::UserId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_license_keys_user")
          .table(LicenseKeys::Table)
          .col(LicenseKeys::UserId)
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_license_keys_usage")
          .table(LicenseKeys::Table)
          .col(LicenseKeys::ActiveUsageId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(LicenseKeys::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum LicenseKeys {
  Table,
  Id,
  Key,
  Duration,
  Tier,
  EffectiveFrom,
  Uses,
  ActiveUsageId,
  Revoked,
  UserId,
  SandboxMode,
  CreatedAt,
  UpdatedAt,
}
