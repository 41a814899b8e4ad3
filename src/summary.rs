//! # Period Summaries
//!
//! Rolls a user's daily snapshots into one weighted summary per period. The
//! summary is a pure function of the snapshots and the catalog weights, so
//! recomputation over unchanged snapshots leaves the stored row untouched.
//!
//! [`SummaryAggregator::team_summary`] lines the whole team up for one period.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{DatabaseConnection, IntoActiveModel, Set};
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::activity::ActivitySource;
use crate::catalog::MetricCatalog;
use crate::error::EngineError;
use crate::kpi::scoring::{self, round1, round2};
use crate::models::daily_snapshot::Model as SnapshotModel;
use crate::models::metric_definition::Model as MetricModel;
use crate::models::period_summary::{self, MetricScore, Model as SummaryModel};
use crate::period::PeriodType;
use crate::repositories::SnapshotRepository;

/// One member's line in a [`TeamSummary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamStanding {
    pub position: usize,
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub overall_score: i32,
    pub performance_tier: String,
    /// `false` when the member has no summary for the period yet
    pub has_summary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSummary {
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub members: Vec<TeamStanding>,
    pub average_score: f64,
    pub tiers: BTreeMap<String, usize>,
}

#[derive(Clone)]
pub struct SummaryAggregator {
    db: DatabaseConnection,
    activity: Arc<dyn ActivitySource>,
    catalog: MetricCatalog,
}

impl SummaryAggregator {
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

    /// Every active member ordered by stored overall score. Members without a
    /// summary count as 0.
    #[instrument(skip(self))]
    pub async fn team_summary(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        date: NaiveDate,
    ) -> Result<TeamSummary, EngineError> {
        let period = period_type.bounds_for(date);
        let stored: HashMap<Uuid, SummaryModel> = SnapshotRepository::new(&self.db, tenant_id)
            .summaries_for_period(period_type, period.start)
            .await?
            .into_iter()
            .map(|summary| (summary.user_id, summary))
            .collect();

        let mut members: Vec<TeamStanding> = self
            .activity
            .sales_team(tenant_id)
            .await?
            .into_iter()
            .map(|member| {
                let summary = stored.get(&member.user_id);
                let overall_score = summary.map_or(0, |s| s.overall_score);
                TeamStanding {
                    position: 0,
                    user_id: member.user_id,
                    display_name: member.display_name,
                    overall_score,
                    performance_tier: summary.map_or_else(
                        || scoring::performance_tier(0).to_string(),
                        |s| s.performance_tier.clone(),
                    ),
                    has_summary: summary.is_some(),
                }
            })
            .collect();
        members.sort_by(|a, b| {
            b.overall_score
                .cmp(&a.overall_score)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        let mut tiers = BTreeMap::new();
        for (index, member) in members.iter_mut().enumerate() {
            member.position = index + 1;
            *tiers.entry(member.performance_tier.clone()).or_insert(0) += 1;
        }
        let average_score = if members.is_empty() {
            0.0
        } else {
            round1(members.iter().map(|m| m.overall_score as f64).sum::<f64>() / members.len() as f64)
        };

        Ok(TeamSummary {
            period_type,
            period_start: period.start,
            period_end: period.end,
            members,
            average_score,
            tiers,
        })
    }

    /// Compute and store the summary of the period containing `period_start`.
    #[instrument(skip(self))]
    pub async fn calculate_period_summary(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> Result<SummaryModel, EngineError> {
        let period = period_type.bounds_for(period_start);
        let repo = SnapshotRepository::new(&self.db, tenant_id);
        let catalog = self.catalog.active_metrics(tenant_id).await?;
        let snapshots = repo.daily_in_range(user_id, period.range()).await?;

        let lines = metric_lines(&catalog, &snapshots);
        let (overall_score, total_weight) = scoring::overall_score(&lines);
        let metric_scores = serde_json::to_value(&lines)?;
        let performance_tier = scoring::performance_tier(overall_score).to_string();
        let working_days = period.working_days();

        let previous_rank = repo
            .find_summary(user_id, period_type, period.previous().start)
            .await?
            .and_then(|previous| previous.rank);

        let existing = repo.find_summary(user_id, period_type, period.start).await?;
        if let Some(current) = existing {
            let unchanged = current.period_end == period.end
                && current.metric_scores == metric_scores
                && current.total_weight == total_weight
                && current.overall_score == overall_score
                && current.performance_tier == performance_tier
                && current.working_days == working_days
                && current.previous_rank == previous_rank;
            if unchanged {
                debug!("Summary unchanged; skipping write");
                return Ok(current);
            }

            let mut active = current.into_active_model();
            active.period_end = Set(period.end);
            active.metric_scores = Set(metric_scores);
            active.total_weight = Set(total_weight);
            active.overall_score = Set(overall_score);
            active.performance_tier = Set(performance_tier);
            active.working_days = Set(working_days);
            active.previous_rank = Set(previous_rank);
            active.calculated_at = Set(Utc::now());
            return Ok(repo.update_summary(active).await?);
        }

        let summary = period_summary::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            user_id: Set(user_id),
            period_type: Set(period_type),
            period_start: Set(period.start),
            period_end: Set(period.end),
            metric_scores: Set(metric_scores),
            total_weight: Set(total_weight),
            overall_score: Set(overall_score),
            performance_tier: Set(performance_tier),
            working_days: Set(working_days),
            rank: Set(None),
            previous_rank: Set(previous_rank),
            rank_change: Set(0),
            calculated_at: Set(Utc::now()),
        };
        Ok(repo.insert_summary(summary).await?)
    }
}

/// Per-metric averages in catalog order. Snapshots of metrics outside the
/// active catalog are ignored.
pub fn metric_lines(catalog: &[MetricModel], snapshots: &[SnapshotModel]) -> Vec<MetricScore> {
    let mut by_metric: HashMap<Uuid, Vec<&SnapshotModel>> = HashMap::new();
    for snapshot in snapshots {
        by_metric.entry(snapshot.metric_id).or_default().push(snapshot);
    }

    catalog
        .iter()
        .filter_map(|metric| {
            let rows = by_metric.get(&metric.id)?;
            let days = rows.len();
            let avg = |f: fn(&SnapshotModel) -> f64| rows.iter().map(|r| f(r)).sum::<f64>() / days as f64;
            Some(MetricScore {
                metric_id: metric.id,
                metric_type: metric.metric_type.clone(),
                weight: metric.weight,
                avg_actual: round2(avg(|r| r.actual_value)),
                avg_target: round2(avg(|r| r.target_value)),
                avg_achievement_percent: round1(avg(|r| r.achievement_percent)),
                score: avg(|r| r.score as f64).round() as i32,
                days,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metric_definition::MetricCategory;

    fn metric(metric_type: &str, weight: i32) -> MetricModel {
        MetricModel {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            metric_type: metric_type.to_string(),
            name: metric_type.to_string(),
            category: MetricCategory::Result,
            weight,
            target_min: 10.0,
            target_good: Some(15.0),
            target_excellent: Some(20.0),
            unit: "count".to_string(),
            calculation_method: "count".to_string(),
            period_type: PeriodType::Monthly,
            is_active: true,
            sort_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn snapshot(metric: &MetricModel, day: u32, actual: f64, score: i32) -> SnapshotModel {
        SnapshotModel {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            user_id: Uuid::nil(),
            metric_id: metric.id,
            metric_type: metric.metric_type.clone(),
            snapshot_date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            actual_value: actual,
            target_value: 10.0,
            achievement_percent: actual * 10.0,
            score,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_metric_lines_average_per_metric_in_catalog_order() {
        let calls = metric("calls_made", 40);
        let revenue = metric("revenue", 60);
        let retired = metric("meetings_held", 10);
        let snapshots = vec![
            snapshot(&revenue, 2, 10.0, 50),
            snapshot(&calls, 2, 4.0, 20),
            snapshot(&revenue, 3, 20.0, 100),
            snapshot(&retired, 2, 9.0, 45),
        ];

        let lines = metric_lines(&[calls.clone(), revenue.clone()], &snapshots);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].metric_type, "calls_made");
        assert_eq!(lines[1].avg_actual, 15.0);
        assert_eq!(lines[1].score, 75);
        assert_eq!(lines[1].days, 2);

        let (overall, total) = scoring::overall_score(&lines);
        assert_eq!(total, 100);
        assert_eq!(overall, 53);
    }

    #[test]
    fn test_metrics_without_snapshots_are_left_out() {
        let calls = metric("calls_made", 100);
        assert!(metric_lines(&[calls], &[]).is_empty());
    }
}
