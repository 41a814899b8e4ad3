//! # Penalty Model
//!
//! Issued penalty and its appeal workflow:
//!
//! ```text
//! pending ──confirm──▶ confirmed
//!    │                    │
//!    └──────appeal────────┴──▶ appealed ──▶ appeal_approved | appeal_rejected
//! ```

use chrono::NaiveDate;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_penalties")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    /// `None` for ad-hoc manual penalties
    pub rule_id: Option<Uuid>,
    pub related_type: Option<String>,
    pub related_id: Option<Uuid>,
    pub issued_on: NaiveDate,
    pub reason: String,
    pub amount: f64,
    pub status: PenaltyStatus,
    pub triggered_at: DateTimeUtc,
    pub appeal_deadline: DateTimeUtc,
    pub issued_by: Option<Uuid>,
    pub confirmed_by: Option<Uuid>,
    pub confirmed_at: Option<DateTimeUtc>,
    pub appeal_reason: Option<String>,
    pub appealed_at: Option<DateTimeUtc>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTimeUtc>,
    pub resolution: Option<String>,
    /// Bonus calculation this penalty has been deducted from
    pub deducted_from_bonus_id: Option<Uuid>,
    pub updated_at: DateTimeUtc,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum PenaltyStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "appealed")]
    Appealed,
    #[sea_orm(string_value = "appeal_approved")]
    AppealApproved,
    #[sea_orm(string_value = "appeal_rejected")]
    AppealRejected,
}

impl PenaltyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PenaltyStatus::Pending => "pending",
            PenaltyStatus::Confirmed => "confirmed",
            PenaltyStatus::Appealed => "appealed",
            PenaltyStatus::AppealApproved => "appeal_approved",
            PenaltyStatus::AppealRejected => "appeal_rejected",
        }
    }

    pub fn can_confirm(&self) -> bool {
        matches!(self, PenaltyStatus::Pending)
    }

    pub fn can_appeal(&self) -> bool {
        matches!(self, PenaltyStatus::Pending | PenaltyStatus::Confirmed)
    }

    pub fn can_review(&self) -> bool {
        matches!(self, PenaltyStatus::Appealed)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
