//! Consecutive-day streak arithmetic.

use chrono::{Duration, NaiveDate};

use crate::models::user_streak::Model as StreakModel;

/// Average daily achievement percent that keeps the daily target streak alive.
pub const DAILY_TARGET_PERCENT: f64 = 80.0;
/// Connected calls a day that keep the calls streak alive.
pub const CALLS_PER_DAY: usize = 10;
/// Completed tasks a day that keep the tasks streak alive.
pub const TASKS_PER_DAY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreakKind {
    DailyTarget,
    Calls,
    Tasks,
}

impl StreakKind {
    pub const ALL: [StreakKind; 3] = [StreakKind::DailyTarget, StreakKind::Calls, StreakKind::Tasks];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreakKind::DailyTarget => "daily_target",
            StreakKind::Calls => "calls",
            StreakKind::Tasks => "tasks",
        }
    }

    /// Streak a trigger metric refers to. `streak_days` is the daily target streak.
    pub fn for_metric(metric: &str) -> Option<Self> {
        match metric {
            "streak_days" | "daily_target" => Some(StreakKind::DailyTarget),
            "calls" | "calls_made" => Some(StreakKind::Calls),
            "tasks" | "tasks_completed" => Some(StreakKind::Tasks),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreakState {
    pub current: i32,
    pub best: i32,
    pub last_qualifying_date: Option<NaiveDate>,
    pub started_on: Option<NaiveDate>,
}

impl From<&StreakModel> for StreakState {
    fn from(model: &StreakModel) -> Self {
        Self {
            current: model.current_streak,
            best: model.best_streak,
            last_qualifying_date: model.last_qualifying_date,
            started_on: model.started_on,
        }
    }
}

impl StreakState {
    /// A running streak that ends unless `today` qualifies.
    pub fn at_risk(&self, today: NaiveDate) -> bool {
        self.current > 0
            && self
                .last_qualifying_date
                .is_some_and(|last| last + Duration::days(1) == today)
    }

    /// Apply the outcome of `day`.
    ///
    /// A qualifying day extends the streak when it follows the last
    /// qualifying day, restarts it at 1 after a gap and changes nothing when
    /// the day was already counted. A failed day resets the streak to 0.
    /// Days at or before the last qualifying day are already settled.
    pub fn record_day(self, day: NaiveDate, qualified: bool) -> StreakState {
        if self.last_qualifying_date.is_some_and(|last| day <= last) {
            return self;
        }

        if !qualified {
            return StreakState {
                current: 0,
                started_on: None,
                ..self
            };
        }

        let continues = self.current > 0
            && self
                .last_qualifying_date
                .is_some_and(|last| last + Duration::days(1) == day);
        let (current, started_on) = if continues {
            (self.current + 1, self.started_on.or(Some(day)))
        } else {
            (1, Some(day))
        };

        StreakState {
            current,
            best: self.best.max(current),
            last_qualifying_date: Some(day),
            started_on,
        }
    }
}

/// Bonus multiplier earned by a streak of `days`.
pub fn multiplier(days: i32) -> f64 {
    match days {
        d if d >= 100 => 1.3,
        d if d >= 60 => 1.25,
        d if d >= 30 => 1.2,
        d if d >= 14 => 1.15,
        d if d >= 7 => 1.1,
        _ => 1.0,
    }
}
