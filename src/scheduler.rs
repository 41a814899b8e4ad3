//! # Sweep Scheduler
//!
//! Background task that walks every active tenant on a fixed tick and runs
//! the batch sweeps in dependency order: snapshots, period summaries,
//! leaderboards and medal settlement, achievements, penalties, lead score
//! decay, then the alert checks. Each sweep is also exposed as an entry point
//! so an external trigger can run it once.
//!
//! Every entry point is a recomputation from source facts and may be re-run.
//! Users are processed in chunks of `scheduler.chunk_size`; a failing user is
//! logged and counted without stopping the sweep, and a failing tenant does
//! not stop the tick.

use std::future::Future;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tokio::time::{Duration as TokioDuration, Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::engine::PerformanceEngine;
use crate::error::EngineError;
use crate::orchestrator::DomainEvent;
use crate::period::PeriodType;
use crate::repositories::TenantDirectory;

/// Outcome of one entry point for one tenant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub sweep: &'static str,
    pub tenant_id: Uuid,
    pub processed: usize,
    pub failed: usize,
}

impl SweepReport {
    fn new(sweep: &'static str, tenant_id: Uuid) -> Self {
        Self {
            sweep,
            tenant_id,
            processed: 0,
            failed: 0,
        }
    }
}

#[derive(Debug, Default)]
struct TickStats {
    tenants: u64,
    tenants_with_errors: u64,
    items_processed: u64,
    items_failed: u64,
}

impl TickStats {
    fn record(&mut self, report: &SweepReport) {
        self.items_processed += report.processed as u64;
        self.items_failed += report.failed as u64;
    }
}

/// Background scheduler service.
pub struct EngineScheduler {
    engine: Arc<PerformanceEngine>,
    config: SchedulerConfig,
}

impl EngineScheduler {
    pub fn new(engine: Arc<PerformanceEngine>, config: SchedulerConfig) -> Self {
        Self { engine, config }
    }

    /// Run the scheduler loop until the provided shutdown token fires.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), EngineError> {
        info!("Starting sweep scheduler");
        let tick_interval = TokioDuration::from_secs(self.config.tick_interval_seconds);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Sweep scheduler shutdown requested");
                    break;
                }
                _ = sleep(tick_interval) => {
                    let tick_started = Instant::now();
                    if let Err(err) = self.tick().await {
                        error!(error = ?err, "Scheduler tick failed");
                    }
                    let elapsed = tick_started.elapsed();
                    histogram!("engine_scheduler_tick_duration_ms")
                        .record(elapsed.as_secs_f64() * 1_000.0);
                }
            }
        }

        info!("Sweep scheduler stopped");
        Ok(())
    }

    /// One pass over every active tenant.
    pub async fn tick(&self) -> Result<(), EngineError> {
        let mut stats = TickStats::default();
        let tenants = TenantDirectory::new(self.engine.db())
            .list_active_tenants()
            .await?;

        for tenant_id in tenants {
            stats.tenants += 1;
            if let Err(err) = self.run_tenant(tenant_id, &mut stats).await {
                stats.tenants_with_errors += 1;
                error!(
                    error = %err,
                    tenant_id = %tenant_id,
                    "Failed to run sweeps for tenant"
                );
            }
        }

        gauge!("engine_scheduler_failed_items").set(stats.items_failed as f64);
        debug!(
            tenants = stats.tenants,
            tenant_errors = stats.tenants_with_errors,
            processed = stats.items_processed,
            failed = stats.items_failed,
            "Scheduler tick completed"
        );
        Ok(())
    }

    async fn run_tenant(&self, tenant_id: Uuid, stats: &mut TickStats) -> Result<(), EngineError> {
        let today = Utc::now().date_naive();

        stats.record(&self.run_daily_snapshot(tenant_id, today).await?);
        for period_type in PeriodType::ALL {
            stats.record(&self.run_period_summary(tenant_id, period_type, today).await?);
            stats.record(&self.run_leaderboard_update(tenant_id, period_type).await?);
            if period_type.awards_medals() {
                stats.record(&self.run_medal_settlement(tenant_id, period_type, today).await?);
            }
        }
        stats.record(&self.run_achievement_sweep(tenant_id).await?);
        stats.record(&self.run_penalty_sweep(tenant_id).await?);
        if self.config.score_decay_enabled {
            stats.record(&self.run_score_decay(tenant_id).await?);
        }
        // Last month's bonuses settle on the first of the month.
        if today.day() == 1 {
            stats.record(
                &self
                    .run_bonus_calculation(tenant_id, PeriodType::Monthly, today - Duration::days(1))
                    .await?,
            );
        }
        stats.record(&self.run_alert_checks(tenant_id).await?);
        stats.record(&self.run_daily_summary(tenant_id).await?);
        stats.record(&self.run_alert_cleanup(tenant_id).await?);
        Ok(())
    }

    /// Recompute `date`'s snapshot of every team member.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn run_daily_snapshot(
        &self,
        tenant_id: Uuid,
        date: NaiveDate,
    ) -> Result<SweepReport, EngineError> {
        let members = self.member_ids(tenant_id).await?;
        let kpi = self.engine.kpi();
        let report = self
            .for_each_member("daily_snapshot", tenant_id, members, |user_id| async move {
                kpi.create_daily_snapshot(tenant_id, user_id, date).await?;
                Ok(1)
            })
            .await;
        Ok(report)
    }

    /// Recompute the summary of the period containing `period_start` for every
    /// team member.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn run_period_summary(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> Result<SweepReport, EngineError> {
        let members = self.member_ids(tenant_id).await?;
        let summaries = self.engine.summaries();
        let report = self
            .for_each_member("period_summary", tenant_id, members, |user_id| async move {
                summaries
                    .calculate_period_summary(tenant_id, user_id, period_type, period_start)
                    .await?;
                Ok(1)
            })
            .await;
        Ok(report)
    }

    /// Re-rank the current board of `period_type` from the stored summaries
    /// and announce large rank moves.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn run_leaderboard_update(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
    ) -> Result<SweepReport, EngineError> {
        let today = Utc::now().date_naive();
        let update = self
            .engine
            .leaderboard()
            .update_leaderboard(tenant_id, period_type, today)
            .await?;
        counter!("engine_sweep_items_total", "sweep" => "leaderboard_update")
            .increment(update.entries as u64);
        let processed = update.entries;
        if !update.moves.is_empty() {
            self.engine
                .dispatch(
                    tenant_id,
                    DomainEvent::LeaderboardUpdated {
                        period_type: update.period_type,
                        period_start: update.period_start,
                        moves: update.moves,
                    },
                )
                .await;
        }
        Ok(SweepReport {
            processed,
            ..SweepReport::new("leaderboard_update", tenant_id)
        })
    }

    /// Pay the medals of the board that closed before the one containing
    /// `date`. Re-running pays nothing twice.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn run_medal_settlement(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        date: NaiveDate,
    ) -> Result<SweepReport, EngineError> {
        let closed = period_type.bounds_for(date).previous();
        let credited = self
            .engine
            .points()
            .settle_medals(tenant_id, period_type, closed.start)
            .await?;
        let report = SweepReport {
            processed: credited,
            ..SweepReport::new("medal_settlement", tenant_id)
        };
        self.count(&report);
        Ok(report)
    }

    /// Settle yesterday's streaks and award every newly met achievement.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn run_achievement_sweep(&self, tenant_id: Uuid) -> Result<SweepReport, EngineError> {
        let yesterday = Utc::now().date_naive() - Duration::days(1);
        let members = self.member_ids(tenant_id).await?;
        let engine = self.engine.as_ref();
        let report = self
            .for_each_member("achievement_sweep", tenant_id, members, |user_id| async move {
                engine
                    .achievements()
                    .process_streaks(tenant_id, user_id, yesterday)
                    .await?;
                engine.award_achievements(tenant_id, user_id).await?;
                Ok(1)
            })
            .await;
        Ok(report)
    }

    /// Evaluate the auto penalty rules once.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn run_penalty_sweep(&self, tenant_id: Uuid) -> Result<SweepReport, EngineError> {
        let sweep = self.engine.penalty_sweep(tenant_id, Utc::now()).await?;
        let report = SweepReport {
            processed: sweep.violations,
            failed: sweep.failed,
            ..SweepReport::new("penalty_sweep", tenant_id)
        };
        self.count(&report);
        Ok(report)
    }

    /// Cool down idle leads. At most one decay step per lead per day.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn run_score_decay(&self, tenant_id: Uuid) -> Result<SweepReport, EngineError> {
        let decay = self.engine.scorer().apply_decay(tenant_id, Utc::now()).await?;
        let report = SweepReport {
            processed: decay.decayed,
            failed: decay.failed,
            ..SweepReport::new("score_decay", tenant_id)
        };
        self.count(&report);
        Ok(report)
    }

    /// Calculate the auto bonuses of the period containing `date`.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn run_bonus_calculation(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        date: NaiveDate,
    ) -> Result<SweepReport, EngineError> {
        let sweep = self.engine.bonus_sweep(tenant_id, period_type, date).await?;
        let report = SweepReport {
            processed: sweep.calculated.len(),
            failed: sweep.failed,
            ..SweepReport::new("bonus_calculation", tenant_id)
        };
        self.count(&report);
        Ok(report)
    }

    /// Lead follow-up, KPI, penalty and streak reminders.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn run_alert_checks(&self, tenant_id: Uuid) -> Result<SweepReport, EngineError> {
        let checks = self
            .engine
            .alert_monitor()
            .run_checks(tenant_id, Utc::now())
            .await;
        let report = SweepReport {
            processed: checks.sent(),
            failed: checks.failed.len(),
            ..SweepReport::new("alert_checks", tenant_id)
        };
        self.count(&report);
        Ok(report)
    }

    /// Morning plan of every member, once per day.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn run_daily_summary(&self, tenant_id: Uuid) -> Result<SweepReport, EngineError> {
        let sent = self
            .engine
            .alert_monitor()
            .send_daily_summary(tenant_id, Utc::now())
            .await?;
        let report = SweepReport {
            processed: sent,
            ..SweepReport::new("daily_summary", tenant_id)
        };
        self.count(&report);
        Ok(report)
    }

    /// Purge settled alerts past their retention.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn run_alert_cleanup(&self, tenant_id: Uuid) -> Result<SweepReport, EngineError> {
        let removed = self
            .engine
            .alert_monitor()
            .cleanup_expired_alerts(tenant_id, Utc::now())
            .await?;
        let report = SweepReport {
            processed: removed as usize,
            ..SweepReport::new("alert_cleanup", tenant_id)
        };
        self.count(&report);
        Ok(report)
    }

    async fn member_ids(&self, tenant_id: Uuid) -> Result<Vec<Uuid>, EngineError> {
        Ok(self
            .engine
            .activity()
            .sales_team(tenant_id)
            .await?
            .into_iter()
            .map(|member| member.user_id)
            .collect())
    }

    async fn for_each_member<F, Fut>(
        &self,
        sweep: &'static str,
        tenant_id: Uuid,
        members: Vec<Uuid>,
        work: F,
    ) -> SweepReport
    where
        F: Fn(Uuid) -> Fut,
        Fut: Future<Output = Result<usize, EngineError>>,
    {
        let mut report = SweepReport::new(sweep, tenant_id);
        let chunk_size = self.config.chunk_size.max(1);

        for (index, chunk) in members.chunks(chunk_size).enumerate() {
            for user_id in chunk {
                match work(*user_id).await {
                    Ok(processed) => report.processed += processed,
                    Err(err) => {
                        report.failed += 1;
                        error!(
                            sweep,
                            tenant_id = %tenant_id,
                            user_id = %user_id,
                            error = %err,
                            "Sweep failed for user"
                        );
                    }
                }
            }
            debug!(sweep, tenant_id = %tenant_id, chunk = index, "Chunk processed");
        }

        self.count(&report);
        info!(
            sweep,
            tenant_id = %tenant_id,
            processed = report.processed,
            failed = report.failed,
            "Sweep completed"
        );
        report
    }

    fn count(&self, report: &SweepReport) {
        counter!("engine_sweep_items_total", "sweep" => report.sweep)
            .increment(report.processed as u64);
        counter!("engine_sweep_failures_total", "sweep" => report.sweep)
            .increment(report.failed as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_stats_accumulate_reports() {
        let tenant = Uuid::new_v4();
        let mut stats = TickStats::default();
        stats.record(&SweepReport {
            processed: 3,
            failed: 1,
            ..SweepReport::new("daily_snapshot", tenant)
        });
        stats.record(&SweepReport {
            processed: 2,
            ..SweepReport::new("period_summary", tenant)
        });
        assert_eq!(stats.items_processed, 5);
        assert_eq!(stats.items_failed, 1);
    }
}
