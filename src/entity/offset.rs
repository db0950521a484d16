use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Memory offsets published for one client build
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "offsets")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: i64,
  #[sea_orm(unique)]
  pub version: String,
  /// Raw JSON document as uploaded
  #[sea_orm(column_type = "Text")]
  pub data: String,
  pub created_at: DateTime,
  pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
