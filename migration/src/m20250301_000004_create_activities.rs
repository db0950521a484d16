use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Activities::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Activities::Id)
              .big_integer()
              .not_null()
              .primary_key(),
          )
          .col(ColumnDef::new(Activities::Kind).string().not_null())
          .col(ColumnDef::new(Activities::UserId).big_integer().null())
          .col(ColumnDef::new(Activities::LicenseKeyId).big_integer().null())
          .col(ColumnDef::new(Activities::PaymentId).big_integer().null())
          .col(ColumnDef::new(Activities::CreatedAt).date_time().not_null())
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_activities_license")
          .table(Activities::Table)
          .col(Activities::LicenseKeyId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(Activities::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum Activities {
  Table,
  Id,
  Kind,
  UserId,
  LicenseKeyId,
  PaymentId,
  CreatedAt,
}
