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
          .table(Payments::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Payments::Id).big_integer().not_null().primary_key(),
          )
          .col(ColumnDef::new(Payments::Provider).string().not_null())
          // idempotency guard for duplicate webhook deliveries
          .col(
            ColumnDef::new(Payments::ReferenceId)
              .string()
              .not_null()
              .unique_key(),
          )
          .col(
            ColumnDef::new(Payments::AmountInCents)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(ColumnDef::new(Payments::Currency).string().not_null().default(""))
          .col(
            ColumnDef::new(Payments::SandboxMode)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(ColumnDef::new(Payments::UserId).big_integer().not_null())
          .col(ColumnDef::new(Payments::LicenseKeyId).big_integer().null())
          .col(
            ColumnDef::new(Payments::IsRenewal)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(
            ColumnDef::new(Payments::LicenseDuration)
              .string()
              .not_null()
              .default("UNSPECIFIED"),
          )
          .col(ColumnDef::new(Payments::BillingEmail).string().null())
          .col(ColumnDef::new(Payments::BillingName).string().null())
          .col(ColumnDef::new(Payments::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_payments_user")
              .from(Payments::Table, Payments::UserId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_payments_user")
          .table(Payments::Table)
          .col(Payments::UserId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Payments::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Payments {
  Table,
  Id,
  Provider,
  ReferenceId,
  AmountInCents,
  Currency,
  SandboxMode,
  UserId,
  LicenseKeyId,
  IsRenewal,
  LicenseDuration,
  BillingEmail,
  BillingName,
  CreatedAt,
}
