//! # Period Summary Model
//!
//! Weighted roll-up of daily snapshots for one user and period. Rank fields
//! are written by the leaderboard ranker and survive summary recomputation.

use chrono::NaiveDate;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::period::PeriodType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_kpi_period_summaries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Ordered list of [`MetricScore`]
    #[sea_orm(column_type = "JsonBinary")]
    pub metric_scores: Json,
    pub total_weight: i32,
    pub overall_score: i32,
    pub performance_tier: String,
    pub working_days: i32,
    pub rank: Option<i32>,
    pub previous_rank: Option<i32>,
    pub rank_change: i32,
    pub calculated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Per-metric line of a period summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub metric_id: Uuid,
    pub metric_type: String,
    pub weight: i32,
    pub avg_actual: f64,
    pub avg_target: f64,
    pub avg_achievement_percent: f64,
    pub score: i32,
    pub days: usize,
}

impl Model {
    /// Decoded per-metric lines; malformed payloads decode as empty.
    pub fn metric_scores(&self) -> Vec<MetricScore> {
        serde_json::from_value(self.metric_scores.clone()).unwrap_or_default()
    }
}
