//! Outbox writes for constructed alerts.

use crate::error::RepositoryError;
use crate::models::sales_alert::{self, AlertStatus, Entity as SalesAlert};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use uuid::Uuid;

pub struct AlertRepository<'a, C: ConnectionTrait> {
    db: &'a C,
    tenant_id: Uuid,
}

impl<'a, C: ConnectionTrait> AlertRepository<'a, C> {
    pub fn new(db: &'a C, tenant_id: Uuid) -> Self {
        Self { db, tenant_id }
    }

    pub async fn insert(
        &self,
        mut alert: sales_alert::ActiveModel,
    ) -> Result<sales_alert::Model, RepositoryError> {
        alert.tenant_id = sea_orm::Set(self.tenant_id);
        alert
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Alerts addressed to `user_id` or broadcast to the tenant, newest first.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<sales_alert::Model>, RepositoryError> {
        SalesAlert::find()
            .filter(sales_alert::Column::TenantId.eq(self.tenant_id))
            .filter(
                sea_orm::Condition::any()
                    .add(sales_alert::Column::UserId.eq(user_id))
                    .add(sales_alert::Column::UserId.is_null()),
            )
            .order_by_desc(sales_alert::Column::CreatedAt)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn list_by_type(
        &self,
        alert_type: &str,
    ) -> Result<Vec<sales_alert::Model>, RepositoryError> {
        SalesAlert::find()
            .filter(sales_alert::Column::TenantId.eq(self.tenant_id))
            .filter(sales_alert::Column::AlertType.eq(alert_type))
            .order_by_asc(sales_alert::Column::CreatedAt)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Whether an alert of this type about `subject_id` was created at or after `since`.
    pub async fn exists_since(
        &self,
        alert_type: &str,
        subject_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let count = SalesAlert::find()
            .filter(sales_alert::Column::TenantId.eq(self.tenant_id))
            .filter(sales_alert::Column::AlertType.eq(alert_type))
            .filter(sales_alert::Column::SubjectId.eq(subject_id))
            .filter(sales_alert::Column::CreatedAt.gte(since))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(count > 0)
    }

    pub async fn set_status(&self, alert_id: Uuid, status: AlertStatus) -> Result<bool, RepositoryError> {
        let result = SalesAlert::update_many()
            .col_expr(sales_alert::Column::Status, Expr::value(status))
            .filter(sales_alert::Column::TenantId.eq(self.tenant_id))
            .filter(sales_alert::Column::Id.eq(alert_id))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(result.rows_affected > 0)
    }

    /// Delete read, dismissed and actioned alerts created before `cutoff`.
    pub async fn delete_settled_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = SalesAlert::delete_many()
            .filter(sales_alert::Column::TenantId.eq(self.tenant_id))
            .filter(sales_alert::Column::Status.is_in(AlertStatus::SETTLED))
            .filter(sales_alert::Column::CreatedAt.lt(cutoff))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(result.rows_affected)
    }
}
