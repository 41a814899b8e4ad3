//! # Metric Repository
//!
//! Tenant metric catalog and per-user target overrides.

use crate::error::RepositoryError;
use crate::models::metric_definition::{
    self, Entity as MetricDefinition, MetricCategory, Model as MetricModel,
};
use crate::models::user_target::{self, Entity as UserTarget};
use crate::period::PeriodType;
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

/// Input for a new catalog entry.
#[derive(Debug, Clone)]
pub struct NewMetricDefinition {
    pub metric_type: String,
    pub name: String,
    pub category: MetricCategory,
    pub weight: i32,
    pub target_min: f64,
    pub target_good: Option<f64>,
    pub target_excellent: Option<f64>,
    pub unit: String,
    pub calculation_method: String,
    pub period_type: PeriodType,
    pub sort_order: i32,
}

pub struct MetricRepository<'a, C: ConnectionTrait> {
    db: &'a C,
    tenant_id: Uuid,
}

impl<'a, C: ConnectionTrait> MetricRepository<'a, C> {
    pub fn new(db: &'a C, tenant_id: Uuid) -> Self {
        Self { db, tenant_id }
    }

    /// Active metrics in display order.
    pub async fn list_active(&self) -> Result<Vec<MetricModel>, RepositoryError> {
        MetricDefinition::find()
            .filter(metric_definition::Column::TenantId.eq(self.tenant_id))
            .filter(metric_definition::Column::IsActive.eq(true))
            .order_by_asc(metric_definition::Column::SortOrder)
            .order_by_asc(metric_definition::Column::MetricType)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_by_id(&self, metric_id: Uuid) -> Result<Option<MetricModel>, RepositoryError> {
        MetricDefinition::find_by_id(metric_id)
            .filter(metric_definition::Column::TenantId.eq(self.tenant_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_by_type(
        &self,
        metric_type: &str,
    ) -> Result<Option<MetricModel>, RepositoryError> {
        MetricDefinition::find()
            .filter(metric_definition::Column::TenantId.eq(self.tenant_id))
            .filter(metric_definition::Column::MetricType.eq(metric_type))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Insert a catalog entry; an existing metric type is left untouched.
    pub async fn create(
        &self,
        request: NewMetricDefinition,
    ) -> Result<MetricModel, RepositoryError> {
        validate_definition(&request)?;

        if let Some(existing) = self.find_by_type(&request.metric_type).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let model = metric_definition::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(self.tenant_id),
            metric_type: Set(request.metric_type),
            name: Set(request.name),
            category: Set(request.category),
            weight: Set(request.weight),
            target_min: Set(request.target_min),
            target_good: Set(request.target_good),
            target_excellent: Set(request.target_excellent),
            unit: Set(request.unit),
            calculation_method: Set(request.calculation_method),
            period_type: Set(request.period_type),
            is_active: Set(true),
            sort_order: Set(request.sort_order),
            created_at: Set(now),
            updated_at: Set(now),
        };

        model
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn update_weight(
        &self,
        metric_id: Uuid,
        weight: i32,
    ) -> Result<MetricModel, RepositoryError> {
        if !(0..=100).contains(&weight) {
            return Err(RepositoryError::validation_error(format!(
                "weight must be between 0 and 100, got {weight}"
            )));
        }
        let metric = self.require(metric_id).await?;
        let mut active = metric.into_active_model();
        active.weight = Set(weight);
        active.updated_at = Set(Utc::now());
        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn update_targets(
        &self,
        metric_id: Uuid,
        target_min: f64,
        target_good: Option<f64>,
        target_excellent: Option<f64>,
    ) -> Result<MetricModel, RepositoryError> {
        validate_targets(target_min, target_good, target_excellent)?;
        let metric = self.require(metric_id).await?;
        let mut active = metric.into_active_model();
        active.target_min = Set(target_min);
        active.target_good = Set(target_good);
        active.target_excellent = Set(target_excellent);
        active.updated_at = Set(Utc::now());
        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn set_active(
        &self,
        metric_id: Uuid,
        is_active: bool,
    ) -> Result<MetricModel, RepositoryError> {
        let metric = self.require(metric_id).await?;
        let mut active = metric.into_active_model();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now());
        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Per-user target for the period starting on `period_start`, if any.
    pub async fn user_target(
        &self,
        user_id: Uuid,
        metric_id: Uuid,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> Result<Option<f64>, RepositoryError> {
        let target = UserTarget::find()
            .filter(user_target::Column::TenantId.eq(self.tenant_id))
            .filter(user_target::Column::UserId.eq(user_id))
            .filter(user_target::Column::MetricId.eq(metric_id))
            .filter(user_target::Column::PeriodType.eq(period_type))
            .filter(user_target::Column::PeriodStart.eq(period_start))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(target.map(|t| t.target_value))
    }

    /// Create or replace a per-user target.
    pub async fn set_user_target(
        &self,
        user_id: Uuid,
        metric_id: Uuid,
        period_type: PeriodType,
        period_start: NaiveDate,
        target_value: f64,
    ) -> Result<(), RepositoryError> {
        if target_value < 0.0 {
            return Err(RepositoryError::validation_error(
                "target value must not be negative",
            ));
        }
        self.require(metric_id).await?;

        let model = user_target::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(self.tenant_id),
            user_id: Set(user_id),
            metric_id: Set(metric_id),
            period_type: Set(period_type),
            period_start: Set(period_start),
            target_value: Set(target_value),
            created_at: Set(Utc::now()),
        };

        UserTarget::insert(model)
            .on_conflict(
                OnConflict::columns([
                    user_target::Column::TenantId,
                    user_target::Column::UserId,
                    user_target::Column::MetricId,
                    user_target::Column::PeriodType,
                    user_target::Column::PeriodStart,
                ])
                .update_column(user_target::Column::TargetValue)
                .to_owned(),
            )
            .exec_without_returning(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(())
    }

    async fn require(&self, metric_id: Uuid) -> Result<MetricModel, RepositoryError> {
        self.find_by_id(metric_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("metric {metric_id}")))
    }
}

fn validate_definition(request: &NewMetricDefinition) -> Result<(), RepositoryError> {
    if request.metric_type.trim().is_empty() {
        return Err(RepositoryError::validation_error(
            "metric type cannot be empty",
        ));
    }
    if !(0..=100).contains(&request.weight) {
        return Err(RepositoryError::validation_error(format!(
            "weight must be between 0 and 100, got {}",
            request.weight
        )));
    }
    validate_targets(
        request.target_min,
        request.target_good,
        request.target_excellent,
    )
}

fn validate_targets(
    min: f64,
    good: Option<f64>,
    excellent: Option<f64>,
) -> Result<(), RepositoryError> {
    if min < 0.0 {
        return Err(RepositoryError::validation_error(
            "target_min must not be negative",
        ));
    }
    let mut floor = min;
    for value in [good, excellent].into_iter().flatten() {
        if value < floor {
            return Err(RepositoryError::validation_error(
                "targets must be ordered min <= good <= excellent",
            ));
        }
        floor = value;
    }
    Ok(())
}
