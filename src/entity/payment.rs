use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Period, user};

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
pub enum Provider {
  #[sea_orm(string_value = "MANUAL")]
  Manual,
  #[sea_orm(string_value = "PAYPAL")]
  Paypal,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: i64,
  pub provider: Provider,
  /// External transaction id, unique per real-world payment
  #[sea_orm(unique)]
  pub reference_id: String,
  pub amount_in_cents: i64,
  pub currency: String,
  pub sandbox_mode: bool,
  pub user_id: i64,
  pub license_key_id: Option<i64>,
  pub is_renewal: bool,
  pub license_duration: Period,
  pub billing_email: Option<String>,
  pub billing_name: Option<String>,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "user::Entity",
    from = "Column::UserId",
    to = "user::Column::Id"
  )]
  User,
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
