//! Level thresholds and the points credited per action and medal.

use serde::Serialize;

use crate::models::leaderboard_entry::Medal;

/// `(level, total points needed)`, ascending.
pub const LEVELS: [(i32, i64); 10] = [
    (1, 0),
    (2, 100),
    (3, 300),
    (4, 600),
    (5, 1_000),
    (6, 1_500),
    (7, 2_500),
    (8, 4_000),
    (9, 6_000),
    (10, 10_000),
];

/// Highest level whose threshold `total_points` reaches.
pub fn level_for(total_points: i64) -> i32 {
    LEVELS
        .iter()
        .rev()
        .find(|(_, needed)| total_points >= *needed)
        .map(|(level, _)| *level)
        .unwrap_or(1)
}

/// Where a balance sits between its level and the next one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelProgress {
    pub level: i32,
    pub total_points: i64,
    /// `None` at the top level
    pub next_level_at: Option<i64>,
    pub percent: f64,
}

pub fn level_progress(total_points: i64) -> LevelProgress {
    let level = level_for(total_points);
    let floor = LEVELS
        .iter()
        .find(|(l, _)| *l == level)
        .map(|(_, needed)| *needed)
        .unwrap_or(0);
    let next_level_at = LEVELS
        .iter()
        .find(|(l, _)| *l == level + 1)
        .map(|(_, needed)| *needed);
    let percent = match next_level_at {
        Some(next) if next > floor => {
            ((total_points - floor) as f64 / (next - floor) as f64 * 100.0).clamp(0.0, 100.0)
        }
        _ => 100.0,
    };
    LevelProgress {
        level,
        total_points,
        next_level_at,
        percent,
    }
}

pub fn medal_points(medal: Medal) -> i64 {
    match medal {
        Medal::Gold => 100,
        Medal::Silver => 50,
        Medal::Bronze => 25,
    }
}

/// Points for a CRM action; `value` is the deal amount or call minutes.
pub fn action_points(action: &str, value: f64) -> i64 {
    match action {
        "lead_converted" => 100 + (value / 100_000.0).floor() as i64,
        "task_completed" => 15,
        "call_completed" => value.max(0.0).floor() as i64,
        "meeting_held" => 50,
        "proposal_sent" => 30,
        _ => 10,
    }
}
