//! CRM call log entry (read-only fact)

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "crm_calls")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub lead_id: Option<Uuid>,
    /// `answered`, `completed`, `missed`, `failed`, ...
    pub status: String,
    pub duration_seconds: i32,
    pub started_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether the call connected to the other party.
    pub fn connected(&self) -> bool {
        matches!(self.status.as_str(), "answered" | "completed")
    }
}
