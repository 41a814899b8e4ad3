//! Measuring achievement triggers and deciding when to award.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::Value;

use crate::models::achievement_definition::{Model as DefinitionModel, TriggerType};
use crate::models::user_achievement::Model as AwardModel;

use super::streaks::{StreakKind, StreakState};

/// Trigger metrics an achievement definition may name.
pub const TRIGGER_METRICS: [&str; 7] = [
    "leads_converted",
    "revenue",
    "calls_made",
    "tasks_completed",
    "kpi_score",
    "gold_medals",
    "first_place_count",
];

/// A metric's value for today and over all time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tally {
    pub today: f64,
    pub all_time: f64,
}

/// Everything the triggers of one user are measured against.
#[derive(Debug, Clone, Default)]
pub struct AchievementFacts {
    tallies: HashMap<&'static str, Tally>,
    streaks: HashMap<StreakKind, StreakState>,
}

impl AchievementFacts {
    pub fn set(&mut self, metric: &'static str, today: f64, all_time: f64) {
        self.tallies.insert(metric, Tally { today, all_time });
    }

    pub fn set_streak(&mut self, kind: StreakKind, state: StreakState) {
        self.streaks.insert(kind, state);
    }

    pub fn streak(&self, kind: StreakKind) -> StreakState {
        self.streaks.get(&kind).copied().unwrap_or_default()
    }

    /// Value compared against the definition's target; unknown metrics are 0.
    pub fn measure(&self, trigger_type: TriggerType, metric: &str) -> f64 {
        match trigger_type {
            TriggerType::Streak => StreakKind::for_metric(metric)
                .map(|kind| self.streak(kind).current as f64)
                .unwrap_or(0.0),
            TriggerType::Threshold => self.tally(metric).today,
            TriggerType::Cumulative | TriggerType::Milestone => self.tally(metric).all_time,
        }
    }

    fn tally(&self, metric: &str) -> Tally {
        self.tallies.get(metric).copied().unwrap_or_default()
    }
}

/// Where a user stands for the extra conditions of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserStanding {
    /// Distinct days with a KPI snapshot
    pub days_active: usize,
    /// Level from the points ledger
    pub level: i32,
}

impl Default for UserStanding {
    fn default() -> Self {
        Self {
            days_active: 0,
            level: 1,
        }
    }
}

/// Extra conditions, all of which must hold. Unknown keys pass.
pub fn conditions_met(conditions: Option<&Value>, standing: &UserStanding) -> bool {
    let Some(Value::Object(conditions)) = conditions else {
        return true;
    };

    conditions.iter().all(|(key, value)| {
        let Some(required) = value.as_f64() else {
            return true;
        };
        match key.as_str() {
            "min_days_active" => standing.days_active as f64 >= required,
            "min_level" => standing.level as f64 >= required,
            _ => true,
        }
    })
}

/// Whether `value` earns the definition given the user's previous award.
///
/// A repeatable achievement is earned again only after a fresh unmet to met
/// transition: a new day for threshold triggers, the next multiple of the
/// target for cumulative and milestone triggers, a new streak run for streak
/// triggers.
pub fn should_award(
    definition: &DefinitionModel,
    previous: Option<&AwardModel>,
    value: f64,
    streak_started_on: Option<NaiveDate>,
    today: NaiveDate,
) -> bool {
    if value < definition.target_value {
        return false;
    }
    let Some(previous) = previous else {
        return true;
    };
    if !definition.is_repeatable {
        return false;
    }

    match definition.trigger_type {
        TriggerType::Threshold => previous.earned_at.date_naive() < today,
        TriggerType::Cumulative | TriggerType::Milestone => {
            definition.target_value > 0.0
                && value >= (previous.times_earned + 1) as f64 * definition.target_value
        }
        TriggerType::Streak => {
            streak_started_on.is_some_and(|start| start > previous.earned_at.date_naive())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;
    use uuid::Uuid;

    fn definition(trigger_type: TriggerType, target: f64, repeatable: bool) -> DefinitionModel {
        DefinitionModel {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            code: "test".to_string(),
            name: "Test".to_string(),
            description: None,
            category: "sales".to_string(),
            metric: "leads_converted".to_string(),
            trigger_type,
            target_value: target,
            conditions: None,
            is_repeatable: repeatable,
            tier: "bronze".to_string(),
            points: 10,
            is_active: true,
        }
    }

    fn award(times_earned: i32, earned_at: DateTime<Utc>) -> AwardModel {
        AwardModel {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            user_id: Uuid::nil(),
            achievement_id: Uuid::nil(),
            progress: 0.0,
            times_earned,
            earned_at,
            is_seen: false,
            is_pinned: false,
            updated_at: earned_at,
        }
    }

    fn standing(days_active: usize, level: i32) -> UserStanding {
        UserStanding { days_active, level }
    }

    #[test]
    fn test_measure_by_trigger_type() {
        let mut facts = AchievementFacts::default();
        facts.set("calls_made", 12.0, 340.0);
        facts.set_streak(
            StreakKind::DailyTarget,
            StreakState {
                current: 5,
                ..Default::default()
            },
        );

        assert_eq!(facts.measure(TriggerType::Threshold, "calls_made"), 12.0);
        assert_eq!(facts.measure(TriggerType::Cumulative, "calls_made"), 340.0);
        assert_eq!(facts.measure(TriggerType::Milestone, "calls_made"), 340.0);
        assert_eq!(facts.measure(TriggerType::Streak, "streak_days"), 5.0);
        assert_eq!(facts.measure(TriggerType::Threshold, "unknown"), 0.0);
    }

    #[test]
    fn test_conditions_are_a_conjunction() {
        let conditions = json!({"min_days_active": 30, "min_level": 2});
        assert!(conditions_met(Some(&conditions), &standing(45, 3)));
        assert!(!conditions_met(Some(&conditions), &standing(10, 3)));
        assert!(!conditions_met(Some(&conditions), &standing(45, 1)));
        assert!(!conditions_met(Some(&conditions), &UserStanding::default()));
        let unknown = json!({"period_type": "monthly"});
        assert!(conditions_met(Some(&unknown), &UserStanding::default()));
        assert!(conditions_met(None, &UserStanding::default()));
    }

    #[test]
    fn test_non_repeatable_is_awarded_once() {
        let today = Utc::now().date_naive();
        let def = definition(TriggerType::Cumulative, 10.0, false);
        assert!(should_award(&def, None, 10.0, None, today));
        assert!(!should_award(&def, None, 9.0, None, today));
        let earned = award(1, Utc::now());
        assert!(!should_award(&def, Some(&earned), 500.0, None, today));
    }

    #[test]
    fn test_repeatable_cumulative_needs_next_multiple() {
        let today = Utc::now().date_naive();
        let def = definition(TriggerType::Cumulative, 10.0, true);
        let earned = award(1, Utc::now());
        assert!(!should_award(&def, Some(&earned), 15.0, None, today));
        assert!(should_award(&def, Some(&earned), 20.0, None, today));
    }

    #[test]
    fn test_repeatable_threshold_once_per_day() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 15, 0, 0).unwrap();
        let today = now.date_naive();
        let def = definition(TriggerType::Threshold, 5.0, true);
        assert!(!should_award(&def, Some(&award(1, now)), 8.0, None, today));
        let yesterday = now - Duration::days(1);
        assert!(should_award(&def, Some(&award(1, yesterday)), 8.0, None, today));
    }

    #[test]
    fn test_repeatable_streak_needs_new_run() {
        let now = Utc.with_ymd_and_hms(2026, 3, 20, 9, 0, 0).unwrap();
        let today = now.date_naive();
        let def = definition(TriggerType::Streak, 7.0, true);
        let earned = award(1, now - Duration::days(5));
        let old_run = Some(today - Duration::days(12));
        let new_run = Some(today - Duration::days(1));
        assert!(!should_award(&def, Some(&earned), 12.0, old_run, today));
        assert!(should_award(&def, Some(&earned), 7.0, new_run, today));
    }
}
