use std::{fmt, str::FromStr};

use sea_orm::{Iterable, entity::prelude::*};
use serde::{Deserialize, Serialize};

use super::user;

/// Duration class of a license. Fixed at creation, kept across renewals.
#[derive(
  Clone,
  Copy,
  Debug,
  PartialEq,
  Eq,
  Hash,
  EnumIter,
  DeriveActiveEnum,
  Serialize,
  Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Period {
  #[sea_orm(string_value = "UNSPECIFIED")]
  Unspecified,
  #[sea_orm(string_value = "LIFETIME")]
  Lifetime,
  #[sea_orm(string_value = "ONE_DAY")]
  OneDay,
  #[sea_orm(string_value = "ONE_WEEK")]
  OneWeek,
  #[sea_orm(string_value = "ONE_MONTH")]
  OneMonth,
  #[sea_orm(string_value = "THREE_MONTHS")]
  ThreeMonths,
  #[sea_orm(string_value = "SIX_MONTHS")]
  SixMonths,
  #[sea_orm(string_value = "ONE_YEAR")]
  OneYear,
}

impl Period {
  pub fn as_str(self) -> &'static str {
    match self {
      Period::Unspecified => "UNSPECIFIED",
      Period::Lifetime => "LIFETIME",
      Period::OneDay => "ONE_DAY",
      Period::OneWeek => "ONE_WEEK",
      Period::OneMonth => "ONE_MONTH",
      Period::ThreeMonths => "THREE_MONTHS",
      Period::SixMonths => "SIX_MONTHS",
      Period::OneYear => "ONE_YEAR",
    }
  }
}

impl fmt::Display for Period {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Period {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Period::iter()
      .find(|period| period.as_str() == s)
      .ok_or_else(|| format!("unknown license duration `{s}`"))
  }
}

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
pub enum Tier {
  #[sea_orm(string_value = "FREE")]
  Free,
  #[sea_orm(string_value = "PREMIUM")]
  Premium,
}

impl Default for Tier {
  fn default() -> Self {
    Self::Premium
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "license_keys")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: i64,
  #[sea_orm(unique)]
  pub key: String,
  pub duration: Period,
  pub tier: Tier,
  /// Start of the current validity window, `None` until first activation
  pub effective_from: Option<DateTime>,
  pub uses: i64,
  pub active_usage_id: String,
  pub revoked: bool,
  pub user_id: i64,
  pub sandbox_mode: bool,
  pub created_at: DateTime,
  pub updated_at: DateTime,
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
