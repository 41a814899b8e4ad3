//! # KPI Calculator
//!
//! Measures a tenant's metrics for one user from activity facts. Two write
//! paths feed the daily snapshot table:
//!
//! - [`KpiCalculator::create_daily_snapshot`] recomputes every active metric
//!   from facts and overwrites the day's rows (batch, idempotent).
//! - [`KpiCalculator::increment_kpi`] adds to today's row with one atomic
//!   UPDATE and re-derives the percent and score (realtime).

pub mod metrics;
pub mod scoring;

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::activity::{ActivitySource, LeadFilter, TaskFilter};
use crate::catalog::MetricCatalog;
use crate::error::EngineError;
use crate::models::daily_snapshot;
use crate::models::metric_definition::Model as MetricModel;
use crate::period::{DateRange, PeriodType};
use crate::repositories::snapshot::SnapshotValues;
use crate::repositories::{MetricRepository, SnapshotRepository};

pub use metrics::MetricFacts;

/// One measured metric, not persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiValue {
    pub metric_id: Uuid,
    pub metric_type: String,
    pub weight: i32,
    pub actual_value: f64,
    pub target_value: f64,
    pub achievement_percent: f64,
    pub score: i32,
}

/// Every active metric of a user for one period.
#[derive(Debug, Clone, Serialize)]
pub struct UserKpiReport {
    pub user_id: Uuid,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub kpis: Vec<KpiValue>,
    pub overall_score: i32,
    pub total_weight: i32,
    pub performance_tier: &'static str,
}

#[derive(Clone)]
pub struct KpiCalculator {
    db: DatabaseConnection,
    activity: Arc<dyn ActivitySource>,
    catalog: MetricCatalog,
}

impl KpiCalculator {
    pub fn new(
        db: DatabaseConnection,
        activity: Arc<dyn ActivitySource>,
        catalog: MetricCatalog,
    ) -> Self {
        Self {
            db,
            activity,
            catalog,
        }
    }

    /// Load the facts every strategy needs for `range`.
    pub async fn load_facts(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        range: DateRange,
    ) -> Result<MetricFacts, EngineError> {
        let window = range.window();
        let stages = self.activity.outcome_stages(tenant_id).await?;
        let leads = self
            .activity
            .leads(tenant_id, &LeadFilter::for_user(user_id))
            .await?;
        let calls = self.activity.calls(tenant_id, user_id, Some(window)).await?;
        let completed_tasks = self
            .activity
            .tasks(
                tenant_id,
                &TaskFilter {
                    assigned_to: Some(user_id),
                    completed_in: Some(window),
                    ..Default::default()
                },
            )
            .await?;

        Ok(MetricFacts {
            window,
            stages,
            leads,
            calls,
            completed_tasks,
        })
    }

    /// Actual value of one metric over `[start, end]`; unknown types are 0.
    pub async fn value(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        metric_type: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<f64, EngineError> {
        if metrics::strategy(metric_type).is_none() {
            debug!(metric_type, "No strategy for metric type");
            return Ok(0.0);
        }
        let facts = self
            .load_facts(tenant_id, user_id, DateRange::new(start, end))
            .await?;
        Ok(metrics::measure(metric_type, &facts))
    }

    /// Value of a metric for the current month.
    pub async fn current_value(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        metric_type: &str,
    ) -> Result<f64, EngineError> {
        let period = PeriodType::Monthly.bounds_for(Utc::now().date_naive());
        self.value(tenant_id, user_id, metric_type, period.start, period.end)
            .await
    }

    /// Target of `metric` for the period starting at `period_start`.
    pub async fn target_for(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        metric: &MetricModel,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> Result<f64, EngineError> {
        let target = MetricRepository::new(&self.db, tenant_id)
            .user_target(user_id, metric.id, period_type, period_start)
            .await?;
        Ok(target.unwrap_or(metric.target_min))
    }

    /// Measure every active metric for the period containing `date`.
    pub async fn calculate_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        period_type: PeriodType,
        date: NaiveDate,
    ) -> Result<UserKpiReport, EngineError> {
        let period = period_type.bounds_for(date);
        let catalog = self.catalog.active_metrics(tenant_id).await?;
        let kpis = self
            .measure_all(tenant_id, user_id, &catalog, period_type, period.range())
            .await?;

        let lines: Vec<_> = kpis
            .iter()
            .map(|kpi| crate::models::period_summary::MetricScore {
                metric_id: kpi.metric_id,
                metric_type: kpi.metric_type.clone(),
                weight: kpi.weight,
                avg_actual: kpi.actual_value,
                avg_target: kpi.target_value,
                avg_achievement_percent: kpi.achievement_percent,
                score: kpi.score,
                days: 1,
            })
            .collect();
        let (overall_score, total_weight) = scoring::overall_score(&lines);

        Ok(UserKpiReport {
            user_id,
            period_type,
            period_start: period.start,
            period_end: period.end,
            kpis,
            overall_score,
            total_weight,
            performance_tier: scoring::performance_tier(overall_score),
        })
    }

    async fn measure_all(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        catalog: &[MetricModel],
        period_type: PeriodType,
        range: DateRange,
    ) -> Result<Vec<KpiValue>, EngineError> {
        if catalog.is_empty() {
            return Ok(Vec::new());
        }
        let facts = self.load_facts(tenant_id, user_id, range).await?;

        let mut values = Vec::with_capacity(catalog.len());
        for metric in catalog {
            let actual = metrics::measure(&metric.metric_type, &facts);
            let target = self
                .target_for(tenant_id, user_id, metric, period_type, range.start)
                .await?;
            values.push(KpiValue {
                metric_id: metric.id,
                metric_type: metric.metric_type.clone(),
                weight: metric.weight,
                actual_value: actual,
                target_value: target,
                achievement_percent: scoring::achievement_percent(actual, target),
                score: scoring::score_for(actual, &metric.thresholds()),
            });
        }
        Ok(values)
    }

    /// Recompute and overwrite the snapshots of `date` for one user.
    #[instrument(skip(self))]
    pub async fn create_daily_snapshot(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<SnapshotValues>, EngineError> {
        let catalog = self.catalog.active_metrics(tenant_id).await?;
        let kpis = self
            .measure_all(
                tenant_id,
                user_id,
                &catalog,
                PeriodType::Daily,
                DateRange::day(date),
            )
            .await?;

        let rows: Vec<SnapshotValues> = kpis
            .into_iter()
            .map(|kpi| SnapshotValues {
                user_id,
                metric_id: kpi.metric_id,
                metric_type: kpi.metric_type,
                snapshot_date: date,
                actual_value: kpi.actual_value,
                target_value: kpi.target_value,
                achievement_percent: kpi.achievement_percent,
                score: kpi.score,
            })
            .collect();

        let txn = self.db.begin().await?;
        let repo = SnapshotRepository::new(&txn, tenant_id);
        for row in &rows {
            repo.upsert_daily(row.clone()).await?;
        }
        txn.commit().await?;

        debug!(snapshots = rows.len(), "Daily snapshot written");
        Ok(rows)
    }

    /// Add `amount` to today's snapshot of `metric_type`.
    ///
    /// Returns `None` when the metric is not in the tenant's active catalog.
    #[instrument(skip(self))]
    pub async fn increment_kpi(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        metric_type: &str,
        amount: f64,
    ) -> Result<Option<daily_snapshot::Model>, EngineError> {
        let Some(metric) = self.catalog.metric_by_type(tenant_id, metric_type).await? else {
            debug!("Metric not in active catalog; increment skipped");
            return Ok(None);
        };
        let today = Utc::now().date_naive();
        let target = self
            .target_for(tenant_id, user_id, &metric, PeriodType::Daily, today)
            .await?;

        let txn = self.db.begin().await?;
        let repo = SnapshotRepository::new(&txn, tenant_id);
        repo.ensure_daily(user_id, metric.id, &metric.metric_type, today, target)
            .await?;
        // The UPDATE holds the row lock until commit, so the re-read below sees
        // every concurrent increment that committed before it.
        repo.add_to_actual(user_id, metric.id, today, amount).await?;
        let snapshot = repo
            .find_daily(user_id, metric.id, today)
            .await?
            .ok_or_else(|| EngineError::not_found("daily snapshot", metric.id))?;

        let percent = scoring::achievement_percent(snapshot.actual_value, snapshot.target_value);
        let score = scoring::score_for(snapshot.actual_value, &metric.thresholds());
        let updated = repo.set_derived(snapshot, percent, score).await?;
        txn.commit().await?;

        debug!(new_value = updated.actual_value, "KPI incremented");
        Ok(Some(updated))
    }

    /// Rewrite today's conversion-rate snapshot with the month-to-date rate.
    #[instrument(skip(self))]
    pub async fn recalculate_conversion_rate(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<f64>, EngineError> {
        let Some(metric) = self
            .catalog
            .metric_by_type(tenant_id, "conversion_rate")
            .await?
        else {
            return Ok(None);
        };

        let today = Utc::now().date_naive();
        let month = PeriodType::Monthly.bounds_for(today);
        let facts = self.load_facts(tenant_id, user_id, month.range()).await?;
        let actual = metrics::measure("conversion_rate", &facts);
        let target = self
            .target_for(tenant_id, user_id, &metric, PeriodType::Monthly, month.start)
            .await?;

        SnapshotRepository::new(&self.db, tenant_id)
            .upsert_daily(SnapshotValues {
                user_id,
                metric_id: metric.id,
                metric_type: metric.metric_type.clone(),
                snapshot_date: today,
                actual_value: actual,
                target_value: target,
                achievement_percent: scoring::achievement_percent(actual, target),
                score: scoring::score_for(actual, &metric.thresholds()),
            })
            .await?;

        Ok(Some(actual))
    }
}
