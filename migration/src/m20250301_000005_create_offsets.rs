use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Offsets::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Offsets::Id).big_integer().not_null().primary_key(),
          )
          .col(
            ColumnDef::new(Offsets::Version).string().not_null().unique_key(),
          )
          .col(ColumnDef::new(Offsets::Data).text().not_null())
          .col(ColumnDef::new(Offsets::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Offsets::UpdatedAt).date_time().not_null())
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Offsets::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Offsets {
  Table,
  Id,
  Version,
  Data,
  CreatedAt,
  UpdatedAt,
}
