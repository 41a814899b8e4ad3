//! # Bonus Calculation Model
//!
//! One computed payout per `(setting, user, period_start)`. Lifecycle:
//! `calculated -> approved -> paid`, or `calculated -> rejected`.

use chrono::NaiveDate;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_bonus_calculations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub setting_id: Uuid,
    pub user_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub kpi_score: i32,
    pub revenue: f64,
    pub working_days: i32,
    pub is_qualified: bool,
    pub disqualification_reason: Option<String>,
    pub base_amount: f64,
    pub tier_multiplier: f64,
    pub applied_tier: Option<String>,
    pub final_amount: f64,
    pub penalty_deductions: f64,
    /// `max(0, final_amount - penalty_deductions)`
    pub net_amount: f64,
    pub status: BonusStatus,
    #[sea_orm(column_type = "JsonBinary")]
    pub breakdown: Json,
    pub calculated_by: Option<Uuid>,
    pub calculated_at: DateTimeUtc,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTimeUtc>,
    pub rejected_by: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub paid_at: Option<DateTimeUtc>,
    pub payment_reference: Option<String>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum BonusStatus {
    #[sea_orm(string_value = "calculated")]
    Calculated,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "paid")]
    Paid,
}

impl BonusStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BonusStatus::Calculated => "calculated",
            BonusStatus::Approved => "approved",
            BonusStatus::Rejected => "rejected",
            BonusStatus::Paid => "paid",
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bonus_setting::Entity",
        from = "Column::SettingId",
        to = "super::bonus_setting::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    BonusSetting,
}

impl Related<super::bonus_setting::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BonusSetting.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
