//! # Metric Definition Model
//!
//! One scorable KPI in a tenant's catalog: its weight, the three target
//! control points used for score mapping, and the period it is tracked over.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

use crate::period::PeriodType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_metric_definitions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    /// Key into the KPI strategy map (e.g. `revenue`, `calls_made`)
    pub metric_type: String,

    pub name: String,

    pub category: MetricCategory,

    /// Share of the overall score, 0-100
    pub weight: i32,

    pub target_min: f64,

    pub target_good: Option<f64>,

    pub target_excellent: Option<f64>,

    /// Display unit (`count`, `currency`, `percent`, `minutes`, `hours`)
    pub unit: String,

    /// `sum`, `count`, `average` or `ratio`; informational
    pub calculation_method: String,

    pub period_type: PeriodType,

    pub is_active: bool,

    pub sort_order: i32,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

/// Grouping used for default weights.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    #[sea_orm(string_value = "result")]
    Result,
    #[sea_orm(string_value = "activity")]
    Activity,
    #[sea_orm(string_value = "quality")]
    Quality,
}

impl MetricCategory {
    /// Category share of the overall score when a catalog is seeded.
    pub fn default_weight(&self) -> i32 {
        match self {
            MetricCategory::Result => 50,
            MetricCategory::Activity => 30,
            MetricCategory::Quality => 20,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_target::Entity")]
    UserTarget,
}

impl Related<super::user_target::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserTarget.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// The three control points a metric is scored against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetThresholds {
    pub min: f64,
    pub good: Option<f64>,
    pub excellent: Option<f64>,
}

impl Model {
    pub fn thresholds(&self) -> TargetThresholds {
        TargetThresholds {
            min: self.target_min,
            good: self.target_good,
            excellent: self.target_excellent,
        }
    }
}
