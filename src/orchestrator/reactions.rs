//! Domain events and the table of reactions each one fans out to.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::leaderboard::RankMove;
use crate::period::PeriodType;

/// Something that happened in the CRM or inside the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    DealClosed {
        lead_id: Uuid,
        user_id: Option<Uuid>,
        amount: f64,
    },
    DealLost {
        lead_id: Uuid,
        user_id: Option<Uuid>,
        reason: String,
        estimated_value: Option<f64>,
    },
    TaskCompleted {
        task_id: Uuid,
        user_id: Option<Uuid>,
        lead_id: Option<Uuid>,
    },
    LeadScoreUpdated {
        lead_id: Uuid,
        assigned_to: Option<Uuid>,
        old_score: i32,
        new_score: i32,
    },
    LeadStageChanged {
        lead_id: Uuid,
        assigned_to: Option<Uuid>,
        new_status: String,
    },
    KpiMilestoneReached {
        user_id: Uuid,
        metric_type: String,
        percentage: f64,
    },
    PenaltyApplied {
        user_id: Uuid,
        penalty_id: Uuid,
        reason: String,
        amount: f64,
    },
    BonusCalculated {
        user_id: Uuid,
        calculation_id: Uuid,
        amount: f64,
        kpi_score: i32,
    },
    AchievementUnlocked {
        user_id: Uuid,
        code: String,
        name: String,
        points: i32,
    },
    /// Raised after a refresh moved at least one member.
    LeaderboardUpdated {
        period_type: PeriodType,
        period_start: NaiveDate,
        moves: Vec<RankMove>,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::DealClosed { .. } => "deal_closed",
            DomainEvent::DealLost { .. } => "deal_lost",
            DomainEvent::TaskCompleted { .. } => "task_completed",
            DomainEvent::LeadScoreUpdated { .. } => "lead_score_updated",
            DomainEvent::LeadStageChanged { .. } => "lead_stage_changed",
            DomainEvent::KpiMilestoneReached { .. } => "kpi_milestone_reached",
            DomainEvent::PenaltyApplied { .. } => "penalty_applied",
            DomainEvent::BonusCalculated { .. } => "bonus_calculated",
            DomainEvent::AchievementUnlocked { .. } => "achievement_unlocked",
            DomainEvent::LeaderboardUpdated { .. } => "leaderboard_updated",
        }
    }

    /// Ordered, independent handlers for this event.
    pub fn reactions(&self) -> &'static [Reaction] {
        use Reaction::*;
        match self {
            DomainEvent::DealClosed { .. } => &[
                IncrementDealKpis,
                CreditActionPoints,
                RefreshLeaderboard,
                CheckDealAchievements,
                CheckRevenueMilestone,
                AlertTeamOfDeal,
            ],
            DomainEvent::DealLost { .. } => &[RecalculateConversionRate],
            DomainEvent::TaskCompleted { .. } => &[
                RescoreLead,
                IncrementTaskKpi,
                CreditActionPoints,
                CheckTaskAchievements,
                ExtendTaskStreak,
            ],
            DomainEvent::LeadScoreUpdated { .. } => &[AlertHotLead, AlertColdLead],
            DomainEvent::LeadStageChanged { .. } => &[RescoreLead, FollowStageOutcome],
            DomainEvent::KpiMilestoneReached { .. } => &[UnlockKpiAchievements, AlertKpiMilestone],
            DomainEvent::PenaltyApplied { .. } => &[AlertPenalty],
            DomainEvent::BonusCalculated { .. } => &[AlertBonus],
            DomainEvent::AchievementUnlocked { .. } => &[AlertAchievement],
            DomainEvent::LeaderboardUpdated { .. } => &[AlertRankChanges],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reaction {
    IncrementDealKpis,
    CreditActionPoints,
    RefreshLeaderboard,
    CheckDealAchievements,
    CheckRevenueMilestone,
    AlertTeamOfDeal,
    RecalculateConversionRate,
    RescoreLead,
    IncrementTaskKpi,
    CheckTaskAchievements,
    ExtendTaskStreak,
    AlertHotLead,
    AlertColdLead,
    FollowStageOutcome,
    UnlockKpiAchievements,
    AlertKpiMilestone,
    AlertPenalty,
    AlertBonus,
    AlertAchievement,
    AlertRankChanges,
}

impl Reaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reaction::IncrementDealKpis => "increment_deal_kpis",
            Reaction::CreditActionPoints => "credit_action_points",
            Reaction::RefreshLeaderboard => "refresh_leaderboard",
            Reaction::CheckDealAchievements => "check_deal_achievements",
            Reaction::CheckRevenueMilestone => "check_revenue_milestone",
            Reaction::AlertTeamOfDeal => "alert_team_of_deal",
            Reaction::RecalculateConversionRate => "recalculate_conversion_rate",
            Reaction::RescoreLead => "rescore_lead",
            Reaction::IncrementTaskKpi => "increment_task_kpi",
            Reaction::CheckTaskAchievements => "check_task_achievements",
            Reaction::ExtendTaskStreak => "extend_task_streak",
            Reaction::AlertHotLead => "alert_hot_lead",
            Reaction::AlertColdLead => "alert_cold_lead",
            Reaction::FollowStageOutcome => "follow_stage_outcome",
            Reaction::UnlockKpiAchievements => "unlock_kpi_achievements",
            Reaction::AlertKpiMilestone => "alert_kpi_milestone",
            Reaction::AlertPenalty => "alert_penalty",
            Reaction::AlertBonus => "alert_bonus",
            Reaction::AlertAchievement => "alert_achievement",
            Reaction::AlertRankChanges => "alert_rank_changes",
        }
    }
}

/// KPI completion percentages that raise a milestone.
pub const KPI_MILESTONES: [u32; 5] = [150, 120, 100, 75, 50];

/// Highest milestone reached by `percentage`.
pub fn milestone_for(percentage: f64) -> Option<u32> {
    KPI_MILESTONES
        .into_iter()
        .find(|milestone| percentage >= *milestone as f64)
}

/// Milestone newly reached when completion moves from `before` to `after`.
pub fn crossed_milestone(before: f64, after: f64) -> Option<u32> {
    let reached = milestone_for(after)?;
    match milestone_for(before) {
        Some(previous) if previous >= reached => None,
        _ => Some(reached),
    }
}

/// All-time task counts that unlock a task achievement.
pub const TASK_ACHIEVEMENTS: [(f64, &str); 3] =
    [(10.0, "tasks_10"), (50.0, "tasks_50"), (100.0, "tasks_100")];

/// Codes earned by a closed deal given the user's all-time won deal count.
pub fn deal_achievement_codes(deals_won: f64, amount: f64, big_deal_amount: f64) -> Vec<&'static str> {
    let mut codes = Vec::new();
    if deals_won >= 1.0 {
        codes.push("first_sale");
    }
    if amount >= big_deal_amount {
        codes.push("big_deal");
    }
    if deals_won >= 10.0 {
        codes.push("deals_10");
    }
    codes
}

pub fn task_achievement_codes(tasks_completed: f64) -> Vec<&'static str> {
    TASK_ACHIEVEMENTS
        .into_iter()
        .filter(|(count, _)| tasks_completed >= *count)
        .map(|(_, code)| code)
        .collect()
}

/// Achievement codes for KPI completion of one metric.
pub fn kpi_achievement_codes(metric_type: &str, percentage: f64) -> Vec<String> {
    [100u32, 120, 150]
        .into_iter()
        .filter(|level| percentage >= *level as f64)
        .map(|level| format!("kpi_{metric_type}_{level}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deal_closed_reactions_in_order() {
        let event = DomainEvent::DealClosed {
            lead_id: Uuid::new_v4(),
            user_id: None,
            amount: 1.0,
        };
        assert_eq!(
            event.reactions(),
            &[
                Reaction::IncrementDealKpis,
                Reaction::CreditActionPoints,
                Reaction::RefreshLeaderboard,
                Reaction::CheckDealAchievements,
                Reaction::CheckRevenueMilestone,
                Reaction::AlertTeamOfDeal,
            ]
        );
    }

    #[test]
    fn test_every_event_has_a_reaction() {
        let user = Uuid::new_v4();
        let events = [
            DomainEvent::DealLost {
                lead_id: user,
                user_id: None,
                reason: "price".into(),
                estimated_value: None,
            },
            DomainEvent::PenaltyApplied {
                user_id: user,
                penalty_id: user,
                reason: "late".into(),
                amount: 10.0,
            },
            DomainEvent::AchievementUnlocked {
                user_id: user,
                code: "first_sale".into(),
                name: "First sale".into(),
                points: 10,
            },
            DomainEvent::LeaderboardUpdated {
                period_type: PeriodType::Daily,
                period_start: NaiveDate::default(),
                moves: Vec::new(),
            },
        ];
        assert!(events.iter().all(|e| !e.reactions().is_empty()));
    }

    #[test]
    fn test_milestones() {
        assert_eq!(milestone_for(49.9), None);
        assert_eq!(milestone_for(50.0), Some(50));
        assert_eq!(milestone_for(119.0), Some(100));
        assert_eq!(milestone_for(180.0), Some(150));

        assert_eq!(crossed_milestone(40.0, 55.0), Some(50));
        assert_eq!(crossed_milestone(55.0, 70.0), None);
        assert_eq!(crossed_milestone(95.0, 130.0), Some(120));
    }

    #[test]
    fn test_deal_achievements() {
        assert_eq!(deal_achievement_codes(1.0, 1_000.0, 50_000_000.0), vec!["first_sale"]);
        assert_eq!(
            deal_achievement_codes(10.0, 60_000_000.0, 50_000_000.0),
            vec!["first_sale", "big_deal", "deals_10"]
        );
        assert!(deal_achievement_codes(0.0, 0.0, 50_000_000.0).is_empty());
    }

    #[test]
    fn test_task_and_kpi_achievements() {
        assert_eq!(task_achievement_codes(55.0), vec!["tasks_10", "tasks_50"]);
        assert_eq!(
            kpi_achievement_codes("revenue", 125.0),
            vec!["kpi_revenue_100".to_string(), "kpi_revenue_120".to_string()]
        );
    }
}
