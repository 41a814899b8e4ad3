//! # Metric Catalog
//!
//! Cached read access to a tenant's active metrics plus the mutations that
//! keep the cache honest. Every mutation drops the tenant's catalog key.

use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{CacheKey, KeyedCache};
use crate::error::EngineError;
use crate::models::metric_definition::Model as MetricModel;
use crate::period::PeriodType;
use crate::repositories::MetricRepository;
use crate::repositories::metric::NewMetricDefinition;
use crate::seeds;

/// Whether the active weights add up to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeightCheck {
    pub valid: bool,
    pub total_weight: i32,
    /// `100 - total_weight`
    pub difference: i32,
    pub kpis_count: usize,
}

impl WeightCheck {
    pub fn of(metrics: &[MetricModel]) -> Self {
        let total_weight = metrics.iter().map(|m| m.weight).sum();
        Self {
            valid: total_weight == 100,
            total_weight,
            difference: 100 - total_weight,
            kpis_count: metrics.len(),
        }
    }
}

/// Equal shares of 100 for `count` metrics; the last one takes the remainder.
pub fn even_weights(count: usize) -> Vec<i32> {
    if count == 0 {
        return Vec::new();
    }
    let share = 100 / count as i32;
    let mut weights = vec![share; count];
    if let Some(last) = weights.last_mut() {
        *last += 100 - share * count as i32;
    }
    weights
}

#[derive(Clone)]
pub struct MetricCatalog {
    db: DatabaseConnection,
    cache: KeyedCache<Vec<MetricModel>>,
}

impl MetricCatalog {
    pub fn new(db: DatabaseConnection, cache: KeyedCache<Vec<MetricModel>>) -> Self {
        Self { db, cache }
    }

    /// Active metrics for the tenant; an empty catalog is a valid answer.
    pub async fn active_metrics(&self, tenant_id: Uuid) -> Result<Vec<MetricModel>, EngineError> {
        let key = CacheKey::metric_catalog(tenant_id);
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let metrics = MetricRepository::new(&self.db, tenant_id)
            .list_active()
            .await?;

        let total_weight: i32 = metrics.iter().map(|m| m.weight).sum();
        if !metrics.is_empty() && total_weight != 100 {
            warn!(
                tenant_id = %tenant_id,
                total_weight,
                "Active metric weights do not sum to 100; overall scores are renormalised"
            );
        }

        self.cache.put(key, metrics.clone()).await;
        Ok(metrics)
    }

    pub async fn metric_by_type(
        &self,
        tenant_id: Uuid,
        metric_type: &str,
    ) -> Result<Option<MetricModel>, EngineError> {
        Ok(self
            .active_metrics(tenant_id)
            .await?
            .into_iter()
            .find(|m| m.metric_type == metric_type))
    }

    pub async fn create_metric(
        &self,
        tenant_id: Uuid,
        request: NewMetricDefinition,
    ) -> Result<MetricModel, EngineError> {
        let metric = MetricRepository::new(&self.db, tenant_id)
            .create(request)
            .await?;
        self.invalidate(tenant_id).await;
        Ok(metric)
    }

    pub async fn update_weight(
        &self,
        tenant_id: Uuid,
        metric_id: Uuid,
        weight: i32,
    ) -> Result<MetricModel, EngineError> {
        let metric = MetricRepository::new(&self.db, tenant_id)
            .update_weight(metric_id, weight)
            .await?;
        self.invalidate(tenant_id).await;
        Ok(metric)
    }

    pub async fn validate_weights(&self, tenant_id: Uuid) -> Result<WeightCheck, EngineError> {
        Ok(WeightCheck::of(&self.active_metrics(tenant_id).await?))
    }

    /// Spread 100 evenly over the active metrics in catalog order.
    pub async fn distribute_weights(&self, tenant_id: Uuid) -> Result<Vec<MetricModel>, EngineError> {
        let txn = self.db.begin().await?;
        let repo = MetricRepository::new(&txn, tenant_id);
        let metrics = repo.list_active().await?;

        let mut updated = Vec::with_capacity(metrics.len());
        for (metric, weight) in metrics.iter().zip(even_weights(metrics.len())) {
            updated.push(repo.update_weight(metric.id, weight).await?);
        }
        txn.commit().await?;
        self.invalidate(tenant_id).await;

        info!(tenant_id = %tenant_id, count = updated.len(), "Metric weights distributed");
        Ok(updated)
    }

    pub async fn update_targets(
        &self,
        tenant_id: Uuid,
        metric_id: Uuid,
        target_min: f64,
        target_good: Option<f64>,
        target_excellent: Option<f64>,
    ) -> Result<MetricModel, EngineError> {
        let metric = MetricRepository::new(&self.db, tenant_id)
            .update_targets(metric_id, target_min, target_good, target_excellent)
            .await?;
        self.invalidate(tenant_id).await;
        Ok(metric)
    }

    pub async fn set_active(
        &self,
        tenant_id: Uuid,
        metric_id: Uuid,
        is_active: bool,
    ) -> Result<MetricModel, EngineError> {
        let metric = MetricRepository::new(&self.db, tenant_id)
            .set_active(metric_id, is_active)
            .await?;
        self.invalidate(tenant_id).await;
        Ok(metric)
    }

    /// Per-user target override; targets are read uncached.
    pub async fn set_user_target(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        metric_id: Uuid,
        period_type: PeriodType,
        period_start: chrono::NaiveDate,
        target_value: f64,
    ) -> Result<(), EngineError> {
        MetricRepository::new(&self.db, tenant_id)
            .set_user_target(user_id, metric_id, period_type, period_start, target_value)
            .await?;
        Ok(())
    }

    /// Create the default catalog. Existing metric types are kept as they are.
    pub async fn seed_defaults(&self, tenant_id: Uuid) -> Result<Vec<MetricModel>, EngineError> {
        let repo = MetricRepository::new(&self.db, tenant_id);
        let mut created = Vec::new();
        for request in seeds::default_metrics() {
            created.push(repo.create(request).await?);
        }
        self.invalidate(tenant_id).await;
        info!(tenant_id = %tenant_id, count = created.len(), "Seeded default metric catalog");
        Ok(created)
    }

    async fn invalidate(&self, tenant_id: Uuid) {
        self.cache
            .invalidate(&[CacheKey::metric_catalog(tenant_id)])
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_weights_sum_to_100() {
        assert_eq!(even_weights(3), vec![33, 33, 34]);
        assert_eq!(even_weights(4), vec![25, 25, 25, 25]);
        assert_eq!(even_weights(7).iter().sum::<i32>(), 100);
        assert!(even_weights(0).is_empty());
    }
}
