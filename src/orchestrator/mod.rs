//! # Orchestrator
//!
//! Dispatches domain events through the reaction table in [`reactions`].
//! Every reaction runs in its own failure boundary: an error is logged and
//! counted, and the remaining reactions still run. Reactions may raise
//! follow-up events (a stage change closing a deal, an achievement to
//! announce), which are dispatched after the current event in FIFO order.
//!
//! The only state held here is the per-tenant leaderboard cooldown.

pub mod cooldown;
pub mod reactions;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use metrics::counter;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::achievements::{AchievementEngine, AwardedAchievement, StreakKind};
use crate::activity::ActivitySource;
use crate::alerts::checks::rank_change_alert;
use crate::alerts::{Alert, AlertSink};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::kpi::KpiCalculator;
use crate::kpi::scoring::achievement_percent;
use crate::lead_scoring::LeadScorer;
use crate::leaderboard::{LeaderboardRanker, LeaderboardUpdate};
use crate::models::achievement_definition::TriggerType;
use crate::models::sales_alert::AlertPriority;
use crate::period::PeriodType;
use crate::points::PointsLedger;
use crate::summary::SummaryAggregator;

pub use cooldown::Cooldown;
pub use reactions::{DomainEvent, Reaction};

/// Upper bound on events handled by one dispatch, follow-ups included.
const MAX_EVENTS_PER_DISPATCH: usize = 32;

/// What happened to one reaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactionOutcome {
    pub event: &'static str,
    pub reaction: Reaction,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub events: Vec<&'static str>,
    pub outcomes: Vec<ReactionOutcome>,
    /// Follow-up events dropped past the per-dispatch bound
    pub dropped: usize,
}

impl DispatchReport {
    pub fn failed(&self) -> impl Iterator<Item = &ReactionOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    activity: Arc<dyn ActivitySource>,
    kpi: KpiCalculator,
    summaries: SummaryAggregator,
    leaderboard: LeaderboardRanker,
    achievements: AchievementEngine,
    scorer: LeadScorer,
    points: PointsLedger,
    alerts: Arc<dyn AlertSink>,
    cooldown: Arc<Cooldown>,
    config: EngineConfig,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        activity: Arc<dyn ActivitySource>,
        kpi: KpiCalculator,
        summaries: SummaryAggregator,
        leaderboard: LeaderboardRanker,
        achievements: AchievementEngine,
        scorer: LeadScorer,
        points: PointsLedger,
        alerts: Arc<dyn AlertSink>,
        config: EngineConfig,
    ) -> Self {
        let cooldown = Arc::new(Cooldown::new(Duration::from_secs(
            config.leaderboard_cooldown_seconds,
        )));
        Self {
            activity,
            kpi,
            summaries,
            leaderboard,
            achievements,
            scorer,
            points,
            alerts,
            cooldown,
            config,
        }
    }

    /// Run every reaction of `event` and of the follow-up events it raises.
    #[instrument(skip(self, event), fields(tenant_id = %tenant_id, event = event.name()))]
    pub async fn dispatch(&self, tenant_id: Uuid, event: DomainEvent) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            if report.events.len() >= MAX_EVENTS_PER_DISPATCH {
                report.dropped += 1 + queue.len();
                warn!(
                    tenant_id = %tenant_id,
                    dropped = report.dropped,
                    "Follow-up event bound reached"
                );
                break;
            }
            report.events.push(event.name());
            debug!(event = event.name(), "Dispatching event");

            for reaction in event.reactions() {
                match self.react(tenant_id, *reaction, &event).await {
                    Ok(follow_ups) => {
                        queue.extend(follow_ups);
                        report.outcomes.push(ReactionOutcome {
                            event: event.name(),
                            reaction: *reaction,
                            error: None,
                        });
                    }
                    Err(err) => {
                        counter!(
                            "orchestrator_reaction_failures_total",
                            "reaction" => reaction.as_str()
                        )
                        .increment(1);
                        error!(
                            tenant_id = %tenant_id,
                            event = event.name(),
                            reaction = reaction.as_str(),
                            error = %err,
                            "Reaction failed"
                        );
                        report.outcomes.push(ReactionOutcome {
                            event: event.name(),
                            reaction: *reaction,
                            error: Some(err.to_string()),
                        });
                    }
                }
            }
        }

        info!(
            tenant_id = %tenant_id,
            events = report.events.len(),
            failed = report.failed().count(),
            "Dispatch completed"
        );
        report
    }

    async fn react(
        &self,
        tenant_id: Uuid,
        reaction: Reaction,
        event: &DomainEvent,
    ) -> Result<Vec<DomainEvent>, EngineError> {
        let today = Utc::now().date_naive();
        match (reaction, event) {
            (
                Reaction::IncrementDealKpis,
                DomainEvent::DealClosed {
                    user_id: Some(user_id),
                    amount,
                    ..
                },
            ) => {
                self.kpi
                    .increment_kpi(tenant_id, *user_id, "leads_converted", 1.0)
                    .await?;
                self.kpi
                    .increment_kpi(tenant_id, *user_id, "revenue", *amount)
                    .await?;
                self.kpi
                    .increment_kpi(tenant_id, *user_id, "deals_count", 1.0)
                    .await?;
                Ok(Vec::new())
            }

            (
                Reaction::CreditActionPoints,
                DomainEvent::DealClosed {
                    lead_id,
                    user_id: Some(user_id),
                    amount,
                },
            ) => {
                self.points
                    .credit_action(tenant_id, *user_id, "lead_converted", *lead_id, *amount)
                    .await?;
                Ok(Vec::new())
            }
            (
                Reaction::CreditActionPoints,
                DomainEvent::TaskCompleted {
                    task_id,
                    user_id: Some(user_id),
                    ..
                },
            ) => {
                self.points
                    .credit_action(tenant_id, *user_id, "task_completed", *task_id, 0.0)
                    .await?;
                Ok(Vec::new())
            }

            (Reaction::RefreshLeaderboard, _) => {
                if !self.cooldown.try_acquire(tenant_id).await {
                    debug!(tenant_id = %tenant_id, "Leaderboard refresh cooling down");
                    return Ok(Vec::new());
                }
                match self
                    .refresh_leaderboard(tenant_id, PeriodType::Daily, today)
                    .await
                {
                    Ok(update) if !update.moves.is_empty() => {
                        Ok(vec![DomainEvent::LeaderboardUpdated {
                            period_type: update.period_type,
                            period_start: update.period_start,
                            moves: update.moves,
                        }])
                    }
                    Ok(_) => Ok(Vec::new()),
                    Err(err) => {
                        self.cooldown.reset(tenant_id).await;
                        Err(err)
                    }
                }
            }

            (
                Reaction::CheckDealAchievements,
                DomainEvent::DealClosed {
                    user_id: Some(user_id),
                    amount,
                    ..
                },
            ) => {
                let facts = self
                    .achievements
                    .load_facts(tenant_id, *user_id, today)
                    .await?;
                let deals_won = facts.measure(TriggerType::Cumulative, "leads_converted");
                let codes = reactions::deal_achievement_codes(
                    deals_won,
                    *amount,
                    self.config.big_deal_amount,
                );
                self.unlock_all(tenant_id, *user_id, codes).await
            }

            (
                Reaction::CheckRevenueMilestone,
                DomainEvent::DealClosed {
                    user_id: Some(user_id),
                    amount,
                    ..
                },
            ) => {
                let report = self
                    .kpi
                    .calculate_for_user(tenant_id, *user_id, PeriodType::Monthly, today)
                    .await?;
                let Some(revenue) = report.kpis.iter().find(|k| k.metric_type == "revenue")
                else {
                    return Ok(Vec::new());
                };
                let before = achievement_percent(
                    (revenue.actual_value - amount).max(0.0),
                    revenue.target_value,
                );
                Ok(
                    reactions::crossed_milestone(before, revenue.achievement_percent)
                        .map(|_| DomainEvent::KpiMilestoneReached {
                            user_id: *user_id,
                            metric_type: "revenue".to_string(),
                            percentage: revenue.achievement_percent,
                        })
                        .into_iter()
                        .collect(),
                )
            }

            (
                Reaction::AlertTeamOfDeal,
                DomainEvent::DealClosed {
                    lead_id,
                    user_id,
                    amount,
                },
            ) => {
                let lead_name = self
                    .activity
                    .lead(tenant_id, *lead_id)
                    .await?
                    .map(|lead| lead.name.unwrap_or_default())
                    .unwrap_or_default();
                self.alerts
                    .send(
                        tenant_id,
                        Alert::new(
                            "deal_closed",
                            "Deal closed",
                            format!("{lead_name} - {amount:.0}"),
                        )
                        .data(json!({
                            "lead_id": lead_id,
                            "amount": amount,
                            "closed_by": user_id,
                        })),
                    )
                    .await?;
                Ok(Vec::new())
            }

            (
                Reaction::RecalculateConversionRate,
                DomainEvent::DealLost {
                    user_id: Some(user_id),
                    lead_id,
                    reason,
                    ..
                },
            ) => {
                let rate = self
                    .kpi
                    .recalculate_conversion_rate(tenant_id, *user_id)
                    .await?;
                info!(
                    tenant_id = %tenant_id,
                    lead_id = %lead_id,
                    user_id = %user_id,
                    lost_reason = %reason,
                    conversion_rate = ?rate,
                    "Deal lost"
                );
                Ok(Vec::new())
            }

            (
                Reaction::RescoreLead,
                DomainEvent::TaskCompleted {
                    lead_id: Some(lead_id),
                    ..
                },
            ) => self.rescore(tenant_id, *lead_id, "task_completed").await,
            (Reaction::RescoreLead, DomainEvent::LeadStageChanged { lead_id, .. }) => {
                self.rescore(tenant_id, *lead_id, "stage_changed").await
            }

            (
                Reaction::IncrementTaskKpi,
                DomainEvent::TaskCompleted {
                    user_id: Some(user_id),
                    ..
                },
            ) => {
                self.kpi
                    .increment_kpi(tenant_id, *user_id, "tasks_completed", 1.0)
                    .await?;
                Ok(Vec::new())
            }

            (
                Reaction::CheckTaskAchievements,
                DomainEvent::TaskCompleted {
                    user_id: Some(user_id),
                    ..
                },
            ) => {
                let facts = self
                    .achievements
                    .load_facts(tenant_id, *user_id, today)
                    .await?;
                let completed = facts.measure(TriggerType::Cumulative, "tasks_completed");
                self.unlock_all(tenant_id, *user_id, reactions::task_achievement_codes(completed))
                    .await
            }

            (
                Reaction::ExtendTaskStreak,
                DomainEvent::TaskCompleted {
                    user_id: Some(user_id),
                    ..
                },
            ) => {
                self.achievements
                    .record_activity(tenant_id, *user_id, StreakKind::Tasks, today)
                    .await?;
                Ok(Vec::new())
            }

            (
                Reaction::AlertHotLead,
                DomainEvent::LeadScoreUpdated {
                    lead_id,
                    assigned_to,
                    old_score,
                    new_score,
                },
            ) => {
                let hot = self.config.hot_lead_threshold;
                if !(*old_score < hot && *new_score >= hot) {
                    return Ok(Vec::new());
                }
                let data = json!({ "lead_id": lead_id, "score": new_score, "previous_score": old_score });
                self.alerts
                    .send(
                        tenant_id,
                        Alert::new(
                            "hot_lead_for_head",
                            "New hot lead",
                            format!("Lead scored {new_score}"),
                        )
                        .priority(AlertPriority::High)
                        .data(data.clone()),
                    )
                    .await?;
                if let Some(user_id) = assigned_to {
                    self.alerts
                        .send(
                            tenant_id,
                            Alert::new(
                                "hot_lead",
                                "Hot lead",
                                format!("Lead scored {new_score}. Contact them now"),
                            )
                            .to(*user_id)
                            .priority(AlertPriority::Urgent)
                            .data(data),
                        )
                        .await?;
                }
                Ok(Vec::new())
            }

            (
                Reaction::AlertColdLead,
                DomainEvent::LeadScoreUpdated {
                    lead_id,
                    assigned_to: Some(user_id),
                    old_score,
                    new_score,
                },
            ) => {
                let cold = self.config.cold_lead_threshold;
                if !(*old_score >= cold && *new_score < cold) {
                    return Ok(Vec::new());
                }
                let category = if *new_score < 20 { "frozen" } else { "cold" };
                self.alerts
                    .send(
                        tenant_id,
                        Alert::new(
                            "lead_cold",
                            "Lead going cold",
                            format!("Lead is now {category}. Re-engage it"),
                        )
                        .to(*user_id)
                        .data(json!({
                            "lead_id": lead_id,
                            "score": new_score,
                            "category": category,
                        })),
                    )
                    .await?;
                Ok(Vec::new())
            }

            (
                Reaction::FollowStageOutcome,
                DomainEvent::LeadStageChanged {
                    lead_id,
                    assigned_to,
                    new_status,
                },
            ) => {
                let stages = self.activity.outcome_stages(tenant_id).await?;
                let Some(lead) = self.activity.lead(tenant_id, *lead_id).await? else {
                    return Err(EngineError::not_found("lead", lead_id));
                };
                if stages.is_won(new_status) && lead.estimated_value > 0.0 {
                    return Ok(vec![DomainEvent::DealClosed {
                        lead_id: *lead_id,
                        user_id: *assigned_to,
                        amount: lead.estimated_value,
                    }]);
                }
                if stages.is_lost(new_status) {
                    if let Some(reason) = lead.lost_reason {
                        return Ok(vec![DomainEvent::DealLost {
                            lead_id: *lead_id,
                            user_id: *assigned_to,
                            reason,
                            estimated_value: Some(lead.estimated_value),
                        }]);
                    }
                }
                Ok(Vec::new())
            }

            (
                Reaction::UnlockKpiAchievements,
                DomainEvent::KpiMilestoneReached {
                    user_id,
                    metric_type,
                    percentage,
                },
            ) => {
                let mut follow_ups = Vec::new();
                for code in reactions::kpi_achievement_codes(metric_type, *percentage) {
                    if let Some(awarded) = self.achievements.unlock(tenant_id, *user_id, &code).await? {
                        follow_ups.push(unlocked(*user_id, &awarded));
                    }
                }
                Ok(follow_ups)
            }

            (
                Reaction::AlertKpiMilestone,
                DomainEvent::KpiMilestoneReached {
                    user_id,
                    metric_type,
                    percentage,
                },
            ) => {
                let Some(milestone) = reactions::milestone_for(*percentage) else {
                    return Ok(Vec::new());
                };
                let priority = if *percentage >= 100.0 {
                    AlertPriority::High
                } else {
                    AlertPriority::Medium
                };
                self.alerts
                    .send(
                        tenant_id,
                        Alert::new(
                            "kpi_milestone",
                            "KPI milestone reached",
                            format!("{metric_type}: {percentage:.1}% of target"),
                        )
                        .to(*user_id)
                        .priority(priority)
                        .data(json!({
                            "kpi_type": metric_type,
                            "percentage": percentage,
                            "milestone": milestone,
                        })),
                    )
                    .await?;
                Ok(Vec::new())
            }

            (
                Reaction::AlertPenalty,
                DomainEvent::PenaltyApplied {
                    user_id,
                    penalty_id,
                    reason,
                    amount,
                },
            ) => {
                self.alerts
                    .send(
                        tenant_id,
                        Alert::new(
                            "penalty_applied",
                            "Penalty applied",
                            format!("{reason} - {amount:.0}"),
                        )
                        .to(*user_id)
                        .priority(AlertPriority::High)
                        .data(json!({
                            "penalty_id": penalty_id,
                            "reason": reason,
                            "amount": amount,
                        })),
                    )
                    .await?;
                Ok(Vec::new())
            }

            (
                Reaction::AlertBonus,
                DomainEvent::BonusCalculated {
                    user_id,
                    calculation_id,
                    amount,
                    kpi_score,
                },
            ) => {
                self.alerts
                    .send(
                        tenant_id,
                        Alert::new(
                            "bonus_calculated",
                            "Bonus calculated",
                            format!("Your bonus: {amount:.0}"),
                        )
                        .to(*user_id)
                        .data(json!({
                            "calculation_id": calculation_id,
                            "amount": amount,
                            "kpi_score": kpi_score,
                        })),
                    )
                    .await?;
                Ok(Vec::new())
            }

            (
                Reaction::AlertAchievement,
                DomainEvent::AchievementUnlocked {
                    user_id,
                    code,
                    name,
                    points,
                },
            ) => {
                self.alerts
                    .send(
                        tenant_id,
                        Alert::new(
                            "achievement",
                            "Achievement unlocked",
                            format!("{name} (+{points} points)"),
                        )
                        .to(*user_id)
                        .priority(AlertPriority::Low)
                        .data(json!({ "code": code, "points": points })),
                    )
                    .await?;
                Ok(Vec::new())
            }

            (
                Reaction::AlertRankChanges,
                DomainEvent::LeaderboardUpdated {
                    period_type, moves, ..
                },
            ) => {
                for rank_move in moves {
                    if let Some(alert) =
                        rank_change_alert(*period_type, rank_move, self.config.rank_change_alert_min)
                    {
                        self.alerts.send(tenant_id, alert).await?;
                    }
                }
                Ok(Vec::new())
            }

            // Event without the data this reaction needs (e.g. no assignee).
            _ => Ok(Vec::new()),
        }
    }

    /// Recompute the period summary of every team member, then re-rank the
    /// board. A member whose summary fails is ranked on the stored one.
    pub async fn refresh_leaderboard(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        date: NaiveDate,
    ) -> Result<LeaderboardUpdate, EngineError> {
        for member in self.activity.sales_team(tenant_id).await? {
            if let Err(err) = self
                .summaries
                .calculate_period_summary(tenant_id, member.user_id, period_type, date)
                .await
            {
                warn!(
                    tenant_id = %tenant_id,
                    user_id = %member.user_id,
                    error = %err,
                    "Summary refresh failed"
                );
            }
        }
        self.leaderboard
            .update_leaderboard(tenant_id, period_type, date)
            .await
    }

    async fn rescore(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        reason: &str,
    ) -> Result<Vec<DomainEvent>, EngineError> {
        let change = self.scorer.score_lead(tenant_id, lead_id, reason).await?;
        if !change.changed() {
            return Ok(Vec::new());
        }
        let assigned_to = self
            .activity
            .lead(tenant_id, lead_id)
            .await?
            .and_then(|lead| lead.assigned_to);
        Ok(vec![DomainEvent::LeadScoreUpdated {
            lead_id,
            assigned_to,
            old_score: change.old_score.unwrap_or(0),
            new_score: change.new_score,
        }])
    }

    async fn unlock_all(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        codes: Vec<&'static str>,
    ) -> Result<Vec<DomainEvent>, EngineError> {
        let mut follow_ups = Vec::new();
        for code in codes {
            if let Some(awarded) = self.achievements.unlock(tenant_id, user_id, code).await? {
                follow_ups.push(unlocked(user_id, &awarded));
            }
        }
        Ok(follow_ups)
    }
}

fn unlocked(user_id: Uuid, awarded: &AwardedAchievement) -> DomainEvent {
    DomainEvent::AchievementUnlocked {
        user_id,
        code: awarded.definition.code.clone(),
        name: awarded.definition.name.clone(),
        points: awarded.definition.points,
    }
}
