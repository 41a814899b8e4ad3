//! # Achievement Definition Model
//!
//! A badge rule: which metric is measured, how (`trigger_type`), the target
//! to reach and optional extra conditions that must all hold.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_achievement_definitions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    /// Trigger metric key (e.g. `leads_converted`, `gold_medals`)
    pub metric: String,
    pub trigger_type: TriggerType,
    pub target_value: f64,
    /// Object of extra conditions, e.g. `{"min_days_active": 30}`
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub conditions: Option<Json>,
    pub is_repeatable: bool,
    pub tier: String,
    pub points: i32,
    pub is_active: bool,
}

/// How the measured value is accumulated before comparing to the target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Today's value only
    #[sea_orm(string_value = "threshold")]
    Threshold,
    /// All-time total
    #[sea_orm(string_value = "cumulative")]
    Cumulative,
    /// Current consecutive-day count
    #[sea_orm(string_value = "streak")]
    Streak,
    /// All-time total, one-off milestone
    #[sea_orm(string_value = "milestone")]
    Milestone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_achievement::Entity")]
    UserAchievement,
}

impl Related<super::user_achievement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserAchievement.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
