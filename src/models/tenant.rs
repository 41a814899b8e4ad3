//! Tenant entity model
//!
//! Every engine table is keyed by tenant. Only batch jobs enumerate tenants.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;

/// Tenant entity representing multi-tenant isolation
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    /// Unique identifier for the tenant (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Display name for the tenant (optional)
    pub name: Option<String>,

    /// Inactive tenants are skipped by scheduled sweeps
    pub is_active: bool,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
