//! CRM task (read-only fact)

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "crm_tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub assigned_to: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    /// `call`, `meeting`, `proposal`, `email`, `follow_up`, ...
    pub kind: String,
    /// `pending`, `in_progress`, `completed`, `cancelled`
    pub status: String,
    pub due_at: Option<DateTimeUtc>,
    pub completed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}
