//! # Sales Alert Model
//!
//! Outbox row for an alert the engine has constructed. A delivery worker
//! outside this crate picks rows up and pushes them to their channels.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_alerts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Recipient; `None` broadcasts to the whole tenant
    pub user_id: Option<Uuid>,
    pub alert_type: String,
    pub priority: AlertPriority,
    pub title: String,
    pub message: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub data: Json,
    /// Array of channel names, e.g. `["app", "push"]`
    #[sea_orm(column_type = "JsonBinary")]
    pub channels: Json,
    /// Lead, warning, streak or member the alert is about; used to avoid
    /// repeating the same alert
    pub subject_id: Option<Uuid>,
    pub status: AlertStatus,
    pub scheduled_at: Option<DateTimeUtc>,
    pub expires_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum AlertPriority {
    #[sea_orm(string_value = "low")]
    Low,
    #[default]
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "urgent")]
    Urgent,
}

/// Set by whoever delivers and displays the alert.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    #[default]
    #[sea_orm(string_value = "unread")]
    Unread,
    #[sea_orm(string_value = "read")]
    Read,
    #[sea_orm(string_value = "dismissed")]
    Dismissed,
    #[sea_orm(string_value = "actioned")]
    Actioned,
}

impl AlertStatus {
    /// Statuses whose rows may be purged once old enough.
    pub const SETTLED: [AlertStatus; 3] = [
        AlertStatus::Read,
        AlertStatus::Dismissed,
        AlertStatus::Actioned,
    ];
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
