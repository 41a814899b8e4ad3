//! # Leaderboard Entry Model
//!
//! Materialised ranking row for one user in one period.

use chrono::NaiveDate;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

use crate::period::PeriodType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_leaderboard_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_score: f64,
    pub weighted_score: f64,
    /// `metric_type -> average actual value` for the period
    #[sea_orm(column_type = "JsonBinary")]
    pub metric_values: Json,
    pub rank: i32,
    pub previous_rank: Option<i32>,
    /// `previous_rank - rank`; positive means the user climbed
    pub rank_change: i32,
    pub medal: Option<Medal>,
    pub updated_at: DateTimeUtc,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum Medal {
    #[sea_orm(string_value = "gold")]
    Gold,
    #[sea_orm(string_value = "silver")]
    Silver,
    #[sea_orm(string_value = "bronze")]
    Bronze,
}

impl Medal {
    /// Medal for a podium rank, `None` outside the top three.
    pub fn for_rank(rank: i32) -> Option<Medal> {
        match rank {
            1 => Some(Medal::Gold),
            2 => Some(Medal::Silver),
            3 => Some(Medal::Bronze),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Raw value of one metric, `0.0` when the metric was not tracked.
    pub fn metric_value(&self, metric_type: &str) -> f64 {
        self.metric_values
            .get(metric_type)
            .and_then(|value| value.as_f64())
            .unwrap_or(0.0)
    }
}
