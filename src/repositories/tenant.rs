//! # Tenant Directory
//!
//! Cross-tenant enumeration for batch jobs. Nothing tenant-facing should hold
//! one of these; per-tenant work goes through the tenant-bound repositories.

use crate::error::RepositoryError;
use crate::models::tenant::{
    ActiveModel as TenantActiveModel, Column as TenantColumn, Entity as Tenant,
    Model as TenantModel,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

/// Explicit cross-tenant capability used by the scheduler.
pub struct TenantDirectory<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> TenantDirectory<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Register a tenant.
    pub async fn create_tenant(&self, name: &str) -> Result<TenantModel, RepositoryError> {
        if name.trim().is_empty() {
            return Err(RepositoryError::validation_error(
                "Tenant name cannot be empty",
            ));
        }

        let tenant = TenantActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(Some(name.trim().to_string())),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        };

        tenant
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn get_tenant(&self, tenant_id: Uuid) -> Result<Option<TenantModel>, RepositoryError> {
        Tenant::find_by_id(tenant_id)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Tenants the scheduled sweeps should visit, oldest first.
    pub async fn list_active_tenants(&self) -> Result<Vec<Uuid>, RepositoryError> {
        let tenants = Tenant::find()
            .filter(TenantColumn::IsActive.eq(true))
            .order_by_asc(TenantColumn::CreatedAt)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(tenants.into_iter().map(|t| t.id).collect())
    }
}
