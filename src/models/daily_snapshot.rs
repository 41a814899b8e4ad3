//! # Daily KPI Snapshot Model
//!
//! One row per `(tenant, user, metric, day)`. The realtime increment path and
//! the batch recompute path both write here.

use chrono::NaiveDate;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_kpi_daily_snapshots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub metric_id: Uuid,
    /// Denormalised from the definition so summaries need no join
    pub metric_type: String,
    pub snapshot_date: NaiveDate,
    pub actual_value: f64,
    pub target_value: f64,
    pub achievement_percent: f64,
    /// Mapped 0-100 score
    pub score: i32,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
