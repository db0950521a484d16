use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
  Clone,
  Copy,
  Debug,
  PartialEq,
  Eq,
  EnumIter,
  DeriveActiveEnum,
  Serialize,
  Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Kind {
  #[sea_orm(string_value = "LICENSE_GENERATION")]
  LicenseGeneration,
  #[sea_orm(string_value = "LICENSE_RENEWAL")]
  LicenseRenewal,
  #[sea_orm(string_value = "LICENSE_REVOCATION")]
  LicenseRevocation,
  #[sea_orm(string_value = "PAYMENT_RECEIVED")]
  PaymentReceived,
  #[sea_orm(string_value = "USER_REGISTER")]
  UserRegister,
  #[sea_orm(string_value = "ADMIN_LICENSE_CREATION")]
  AdminLicenseCreation,
  #[sea_orm(string_value = "ADMIN_LICENSE_REVOCATION")]
  AdminLicenseRevocation,
}

/// Append-only audit trail
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activities")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: i64,
  pub kind: Kind,
  pub user_id: Option<i64>,
  pub license_key_id: Option<i64>,
  pub payment_id: Option<i64>,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
