//! # Engine
//!
//! Wires the components onto one connection pool and one set of caches, and
//! feeds sweep results that concern users (penalties, bonuses, achievements)
//! back through the orchestrator so they raise alerts.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::achievements::{AchievementEngine, AwardedAchievement};
use crate::activity::{ActivitySource, SqlActivitySource};
use crate::alerts::checks::AlertMonitor;
use crate::alerts::{AlertSink, DbAlertSink};
use crate::bonus::{BonusCalculator, BonusSweepReport};
use crate::cache::EngineCache;
use crate::catalog::MetricCatalog;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::kpi::KpiCalculator;
use crate::lead_scoring::LeadScorer;
use crate::leaderboard::LeaderboardRanker;
use crate::models::bonus_calculation::BonusStatus;
use crate::models::tenant::Model as TenantModel;
use crate::orchestrator::{DispatchReport, DomainEvent, Orchestrator};
use crate::penalties::{PenaltyEngine, PenaltySweepReport};
use crate::period::PeriodType;
use crate::points::PointsLedger;
use crate::repositories::{BonusRepository, TenantDirectory};
use crate::summary::SummaryAggregator;

/// Rows created when a tenant is bootstrapped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BootstrapReport {
    pub metrics: usize,
    pub lead_rules: usize,
    pub achievements: usize,
    pub penalty_rules: usize,
    pub bonus_setting: String,
}

#[derive(Clone)]
pub struct PerformanceEngine {
    db: DatabaseConnection,
    config: EngineConfig,
    cache: EngineCache,
    activity: Arc<dyn ActivitySource>,
    catalog: MetricCatalog,
    kpi: KpiCalculator,
    summaries: SummaryAggregator,
    leaderboard: LeaderboardRanker,
    scorer: LeadScorer,
    points: PointsLedger,
    achievements: AchievementEngine,
    penalties: PenaltyEngine,
    bonuses: BonusCalculator,
    orchestrator: Orchestrator,
    monitor: AlertMonitor,
}

impl PerformanceEngine {
    /// Engine reading CRM facts from and queueing alerts into `db`.
    pub fn new(db: DatabaseConnection, config: EngineConfig) -> Self {
        let activity: Arc<dyn ActivitySource> = Arc::new(SqlActivitySource::new(db.clone()));
        let alerts: Arc<dyn AlertSink> = Arc::new(DbAlertSink::new(db.clone()));
        Self::with_collaborators(db, config, activity, alerts)
    }

    pub fn with_collaborators(
        db: DatabaseConnection,
        config: EngineConfig,
        activity: Arc<dyn ActivitySource>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let cache = EngineCache::new(config.cache_capacity);
        let catalog = MetricCatalog::new(db.clone(), cache.metric_catalog.clone());
        let kpi = KpiCalculator::new(db.clone(), activity.clone(), catalog.clone());
        let summaries = SummaryAggregator::new(db.clone(), activity.clone(), catalog.clone());
        let leaderboard = LeaderboardRanker::new(
            db.clone(),
            activity.clone(),
            cache.leaderboard_pages.clone(),
        );
        let scorer = LeadScorer::new(db.clone(), activity.clone(), config.clone());
        let points = PointsLedger::new(db.clone());
        let achievements = AchievementEngine::new(db.clone(), activity.clone(), points.clone());
        let penalties = PenaltyEngine::new(db.clone(), activity.clone(), config.clone());
        let bonuses = BonusCalculator::new(db.clone(), activity.clone(), kpi.clone());
        let monitor = AlertMonitor::new(
            db.clone(),
            activity.clone(),
            alerts.clone(),
            config.clone(),
        );
        let orchestrator = Orchestrator::new(
            activity.clone(),
            kpi.clone(),
            summaries.clone(),
            leaderboard.clone(),
            achievements.clone(),
            scorer.clone(),
            points.clone(),
            alerts,
            config.clone(),
        );

        Self {
            db,
            config,
            cache,
            activity,
            catalog,
            kpi,
            summaries,
            leaderboard,
            scorer,
            points,
            achievements,
            penalties,
            bonuses,
            orchestrator,
            monitor,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &EngineCache {
        &self.cache
    }

    pub fn activity(&self) -> &Arc<dyn ActivitySource> {
        &self.activity
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    pub fn kpi(&self) -> &KpiCalculator {
        &self.kpi
    }

    pub fn summaries(&self) -> &SummaryAggregator {
        &self.summaries
    }

    pub fn leaderboard(&self) -> &LeaderboardRanker {
        &self.leaderboard
    }

    pub fn scorer(&self) -> &LeadScorer {
        &self.scorer
    }

    pub fn points(&self) -> &PointsLedger {
        &self.points
    }

    pub fn achievements(&self) -> &AchievementEngine {
        &self.achievements
    }

    pub fn penalties(&self) -> &PenaltyEngine {
        &self.penalties
    }

    pub fn bonuses(&self) -> &BonusCalculator {
        &self.bonuses
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn alert_monitor(&self) -> &AlertMonitor {
        &self.monitor
    }

    /// Register a tenant and give it the default configuration.
    pub async fn create_tenant(
        &self,
        name: &str,
    ) -> Result<(TenantModel, BootstrapReport), EngineError> {
        let tenant = TenantDirectory::new(&self.db).create_tenant(name).await?;
        let report = self.bootstrap_tenant(tenant.id).await?;
        Ok((tenant, report))
    }

    /// Seed every component's defaults. Safe to repeat: existing rows are kept.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn bootstrap_tenant(&self, tenant_id: Uuid) -> Result<BootstrapReport, EngineError> {
        let report = BootstrapReport {
            metrics: self.catalog.seed_defaults(tenant_id).await?.len(),
            lead_rules: self.scorer.seed_default_rules(tenant_id).await?,
            achievements: self.achievements.seed_defaults(tenant_id).await?,
            penalty_rules: self.penalties.seed_defaults(tenant_id).await?,
            bonus_setting: self.bonuses.seed_defaults(tenant_id).await?.name,
        };
        info!(tenant_id = %tenant_id, ?report, "Tenant bootstrapped");
        Ok(report)
    }

    pub async fn dispatch(&self, tenant_id: Uuid, event: DomainEvent) -> DispatchReport {
        self.orchestrator.dispatch(tenant_id, event).await
    }

    /// Run the penalty sweep and announce every penalty it charged.
    pub async fn penalty_sweep(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PenaltySweepReport, EngineError> {
        let report = self.penalties.run_sweep(tenant_id, now).await?;
        for penalty in &report.penalties {
            self.dispatch(
                tenant_id,
                DomainEvent::PenaltyApplied {
                    user_id: penalty.user_id,
                    penalty_id: penalty.id,
                    reason: penalty.reason.clone(),
                    amount: penalty.amount,
                },
            )
            .await;
        }
        Ok(report)
    }

    /// Calculate the auto bonuses of a period. Users are told about a
    /// calculation when it is new or its net amount moved.
    pub async fn bonus_sweep(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        date: NaiveDate,
    ) -> Result<BonusSweepReport, EngineError> {
        let before: HashMap<Uuid, f64> = BonusRepository::new(&self.db, tenant_id)
            .with_status(BonusStatus::Calculated)
            .await?
            .into_iter()
            .map(|c| (c.id, c.net_amount))
            .collect();

        let report = self.bonuses.calculate_period(tenant_id, period_type, date).await?;
        for calculation in &report.calculated {
            if before.get(&calculation.id) == Some(&calculation.net_amount) {
                continue;
            }
            self.dispatch(
                tenant_id,
                DomainEvent::BonusCalculated {
                    user_id: calculation.user_id,
                    calculation_id: calculation.id,
                    amount: calculation.net_amount,
                    kpi_score: calculation.kpi_score,
                },
            )
            .await;
        }
        Ok(report)
    }

    /// Evaluate every achievement for one user and announce the new awards.
    pub async fn award_achievements(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<AwardedAchievement>, EngineError> {
        let awarded = self
            .achievements
            .check_and_award(tenant_id, user_id, None)
            .await?;
        for award in &awarded {
            self.dispatch(
                tenant_id,
                DomainEvent::AchievementUnlocked {
                    user_id,
                    code: award.definition.code.clone(),
                    name: award.definition.name.clone(),
                    points: award.definition.points,
                },
            )
            .await;
        }
        Ok(awarded)
    }
}
