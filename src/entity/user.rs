use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{license_key, payment};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: i64,
  /// Forum account id from the SSO payload
  #[sea_orm(unique)]
  pub discourse_id: i64,
  pub username: String,
  pub email: String,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "license_key::Entity")]
  LicenseKeys,
  #[sea_orm(has_many = "payment::Entity")]
  Payments,
}

impl Related<license_key::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::LicenseKeys.def()
  }
}

impl Related<payment::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Payments.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
