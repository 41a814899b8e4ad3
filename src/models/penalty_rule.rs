//! # Penalty Rule Model
//!
//! Violation rule evaluated by the penalty sweep (`trigger_type = auto`) or
//! applied by hand (`manual`). `conditions` parameterises the detector named
//! by `trigger_event`.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_penalty_rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub name: String,
    pub category: String,
    /// Detector key, e.g. `lead_not_contacted_24h`
    pub trigger_event: String,
    pub trigger_type: RuleTriggerType,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub conditions: Option<Json>,
    /// `fixed` or `points`; informational, the amount is charged as-is
    pub penalty_type: String,
    pub penalty_amount: f64,
    /// Valid warnings tolerated before violations become penalties
    pub warning_threshold: i32,
    pub warning_validity_days: i32,
    pub daily_limit: Option<i32>,
    pub monthly_limit: Option<i32>,
    pub is_active: bool,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum RuleTriggerType {
    #[sea_orm(string_value = "auto")]
    Auto,
    #[sea_orm(string_value = "manual")]
    Manual,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Integer condition parameter, falling back to `default`.
    pub fn condition_i64(&self, key: &str, default: i64) -> i64 {
        self.conditions
            .as_ref()
            .and_then(|c| c.get(key))
            .and_then(|v| v.as_i64())
            .unwrap_or(default)
    }

    /// String-list condition parameter, empty when absent.
    pub fn condition_strings(&self, key: &str) -> Vec<String> {
        self.conditions
            .as_ref()
            .and_then(|c| c.get(key))
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
