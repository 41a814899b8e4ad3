//! All-time best value per tenant and record type.

use chrono::NaiveDate;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::period::PeriodType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_leaderboard_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// e.g. `highest_monthly_score`, `most_leads_weekly`
    pub record_type: String,
    pub user_id: Uuid,
    pub value: f64,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub previous_user_id: Option<Uuid>,
    pub previous_value: Option<f64>,
    pub achieved_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
