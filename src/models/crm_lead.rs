//! CRM lead / deal (read-only fact)

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "crm_leads")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub assigned_to: Option<Uuid>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub region: Option<String>,
    pub source: Option<String>,
    /// Slug of the pipeline stage the lead currently sits in
    pub status: String,
    pub estimated_value: f64,
    pub lost_reason: Option<String>,
    pub activities_count: i32,
    pub first_response_at: Option<DateTimeUtc>,
    pub last_contacted_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    /// Moves whenever the stage changes; closing dates are read from here
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
