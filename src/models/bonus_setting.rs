//! # Bonus Setting Model
//!
//! Qualification gate, base amount and tier table for one bonus scheme.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

use crate::period::PeriodType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_bonus_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub period_type: PeriodType,
    pub calculation_type: CalculationType,
    pub base_amount: f64,
    /// Share of period revenue, in percent, for `revenue_percent`
    pub revenue_percent: f64,
    /// Array of `{"min_score": 100, "multiplier": 1.2, "name": "..."}`
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub tiers: Option<Json>,
    pub min_kpi_score: i32,
    pub min_working_days: i32,
    /// Team roles the scheme applies to; all roles when absent
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub applicable_roles: Option<Json>,
    pub auto_calculate: bool,
    pub is_active: bool,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum CalculationType {
    #[sea_orm(string_value = "fixed")]
    Fixed,
    #[sea_orm(string_value = "revenue_percent")]
    RevenuePercent,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::bonus_calculation::Entity")]
    BonusCalculation,
}

impl Related<super::bonus_calculation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BonusCalculation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether a team member with `role` is covered by this scheme.
    pub fn applies_to_role(&self, role: &str) -> bool {
        match self.applicable_roles.as_ref().and_then(|r| r.as_array()) {
            Some(roles) if !roles.is_empty() => roles.iter().any(|r| r.as_str() == Some(role)),
            _ => true,
        }
    }
}
