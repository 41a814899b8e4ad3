//! # Snapshot Repository
//!
//! Daily KPI snapshots and the period summaries rolled up from them.

use crate::error::RepositoryError;
use crate::models::daily_snapshot::{self, Entity as DailySnapshot, Model as SnapshotModel};
use crate::models::period_summary::{self, Entity as PeriodSummary, Model as SummaryModel};
use crate::period::{DateRange, PeriodType};
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

/// Values written into a daily snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotValues {
    pub user_id: Uuid,
    pub metric_id: Uuid,
    pub metric_type: String,
    pub snapshot_date: NaiveDate,
    pub actual_value: f64,
    pub target_value: f64,
    pub achievement_percent: f64,
    pub score: i32,
}

pub struct SnapshotRepository<'a, C: ConnectionTrait> {
    db: &'a C,
    tenant_id: Uuid,
}

impl<'a, C: ConnectionTrait> SnapshotRepository<'a, C> {
    pub fn new(db: &'a C, tenant_id: Uuid) -> Self {
        Self { db, tenant_id }
    }

    /// Insert or overwrite the snapshot for `(user, metric, day)`.
    pub async fn upsert_daily(&self, values: SnapshotValues) -> Result<(), RepositoryError> {
        let model = daily_snapshot::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(self.tenant_id),
            user_id: Set(values.user_id),
            metric_id: Set(values.metric_id),
            metric_type: Set(values.metric_type),
            snapshot_date: Set(values.snapshot_date),
            actual_value: Set(values.actual_value),
            target_value: Set(values.target_value),
            achievement_percent: Set(values.achievement_percent),
            score: Set(values.score),
            updated_at: Set(Utc::now()),
        };

        DailySnapshot::insert(model)
            .on_conflict(
                OnConflict::columns(natural_key())
                    .update_columns([
                        daily_snapshot::Column::MetricType,
                        daily_snapshot::Column::ActualValue,
                        daily_snapshot::Column::TargetValue,
                        daily_snapshot::Column::AchievementPercent,
                        daily_snapshot::Column::Score,
                        daily_snapshot::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(())
    }

    /// Create a zeroed snapshot row unless one already exists.
    pub async fn ensure_daily(
        &self,
        user_id: Uuid,
        metric_id: Uuid,
        metric_type: &str,
        snapshot_date: NaiveDate,
        target_value: f64,
    ) -> Result<(), RepositoryError> {
        let model = daily_snapshot::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(self.tenant_id),
            user_id: Set(user_id),
            metric_id: Set(metric_id),
            metric_type: Set(metric_type.to_string()),
            snapshot_date: Set(snapshot_date),
            actual_value: Set(0.0),
            target_value: Set(target_value),
            achievement_percent: Set(0.0),
            score: Set(0),
            updated_at: Set(Utc::now()),
        };

        DailySnapshot::insert(model)
            .on_conflict(OnConflict::columns(natural_key()).do_nothing().to_owned())
            .exec_without_returning(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(())
    }

    /// `actual_value += amount` as one UPDATE statement.
    pub async fn add_to_actual(
        &self,
        user_id: Uuid,
        metric_id: Uuid,
        snapshot_date: NaiveDate,
        amount: f64,
    ) -> Result<u64, RepositoryError> {
        let result = DailySnapshot::update_many()
            .col_expr(
                daily_snapshot::Column::ActualValue,
                Expr::col(daily_snapshot::Column::ActualValue).add(amount),
            )
            .col_expr(daily_snapshot::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(daily_snapshot::Column::TenantId.eq(self.tenant_id))
            .filter(daily_snapshot::Column::UserId.eq(user_id))
            .filter(daily_snapshot::Column::MetricId.eq(metric_id))
            .filter(daily_snapshot::Column::SnapshotDate.eq(snapshot_date))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(result.rows_affected)
    }

    /// Overwrite the derived columns of a snapshot.
    pub async fn set_derived(
        &self,
        snapshot: SnapshotModel,
        achievement_percent: f64,
        score: i32,
    ) -> Result<SnapshotModel, RepositoryError> {
        let mut active = snapshot.into_active_model();
        active.achievement_percent = Set(achievement_percent);
        active.score = Set(score);
        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_daily(
        &self,
        user_id: Uuid,
        metric_id: Uuid,
        snapshot_date: NaiveDate,
    ) -> Result<Option<SnapshotModel>, RepositoryError> {
        DailySnapshot::find()
            .filter(daily_snapshot::Column::TenantId.eq(self.tenant_id))
            .filter(daily_snapshot::Column::UserId.eq(user_id))
            .filter(daily_snapshot::Column::MetricId.eq(metric_id))
            .filter(daily_snapshot::Column::SnapshotDate.eq(snapshot_date))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// All snapshots of a user inside `range`, ordered by day then metric.
    pub async fn daily_in_range(
        &self,
        user_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<SnapshotModel>, RepositoryError> {
        DailySnapshot::find()
            .filter(daily_snapshot::Column::TenantId.eq(self.tenant_id))
            .filter(daily_snapshot::Column::UserId.eq(user_id))
            .filter(daily_snapshot::Column::SnapshotDate.gte(range.start))
            .filter(daily_snapshot::Column::SnapshotDate.lte(range.end))
            .order_by_asc(daily_snapshot::Column::SnapshotDate)
            .order_by_asc(daily_snapshot::Column::MetricType)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Number of distinct days the user has any snapshot.
    pub async fn active_days(&self, user_id: Uuid) -> Result<usize, RepositoryError> {
        let dates: Vec<NaiveDate> = DailySnapshot::find()
            .select_only()
            .column(daily_snapshot::Column::SnapshotDate)
            .distinct()
            .filter(daily_snapshot::Column::TenantId.eq(self.tenant_id))
            .filter(daily_snapshot::Column::UserId.eq(user_id))
            .into_tuple()
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(dates.len())
    }

    pub async fn find_summary(
        &self,
        user_id: Uuid,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> Result<Option<SummaryModel>, RepositoryError> {
        PeriodSummary::find()
            .filter(period_summary::Column::TenantId.eq(self.tenant_id))
            .filter(period_summary::Column::UserId.eq(user_id))
            .filter(period_summary::Column::PeriodType.eq(period_type))
            .filter(period_summary::Column::PeriodStart.eq(period_start))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Every summary of one period, best score first.
    pub async fn summaries_for_period(
        &self,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> Result<Vec<SummaryModel>, RepositoryError> {
        PeriodSummary::find()
            .filter(period_summary::Column::TenantId.eq(self.tenant_id))
            .filter(period_summary::Column::PeriodType.eq(period_type))
            .filter(period_summary::Column::PeriodStart.eq(period_start))
            .order_by_desc(period_summary::Column::OverallScore)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn insert_summary(
        &self,
        mut summary: period_summary::ActiveModel,
    ) -> Result<SummaryModel, RepositoryError> {
        summary.tenant_id = Set(self.tenant_id);
        summary
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn update_summary(
        &self,
        summary: period_summary::ActiveModel,
    ) -> Result<SummaryModel, RepositoryError> {
        summary
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}

fn natural_key() -> [daily_snapshot::Column; 4] {
    [
        daily_snapshot::Column::TenantId,
        daily_snapshot::Column::UserId,
        daily_snapshot::Column::MetricId,
        daily_snapshot::Column::SnapshotDate,
    ]
}
