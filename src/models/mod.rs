//! # Data Models
//!
//! SeaORM entities for the performance engine. The `crm_*` and team tables
//! are read-only activity facts owned by the surrounding CRM; every other
//! table is written by the engine.

pub mod achievement_definition;
pub mod bonus_calculation;
pub mod bonus_setting;
pub mod crm_call;
pub mod crm_lead;
pub mod crm_task;
pub mod daily_snapshot;
pub mod lead_score;
pub mod lead_score_history;
pub mod lead_scoring_rule;
pub mod leaderboard_entry;
pub mod leaderboard_record;
pub mod metric_definition;
pub mod penalty;
pub mod penalty_rule;
pub mod penalty_warning;
pub mod period_summary;
pub mod pipeline_stage;
pub mod points_transaction;
pub mod sales_alert;
pub mod team_member;
pub mod tenant;
pub mod user_achievement;
pub mod user_points;
pub mod user_streak;
pub mod user_target;

pub use achievement_definition::Entity as AchievementDefinition;
pub use bonus_calculation::Entity as BonusCalculation;
pub use bonus_setting::Entity as BonusSetting;
pub use daily_snapshot::Entity as DailySnapshot;
pub use lead_score::Entity as LeadScore;
pub use leaderboard_entry::Entity as LeaderboardEntry;
pub use metric_definition::Entity as MetricDefinition;
pub use penalty::Entity as Penalty;
pub use penalty_rule::Entity as PenaltyRule;
pub use period_summary::Entity as PeriodSummary;
pub use tenant::Entity as Tenant;
pub use user_points::Entity as UserPoints;
