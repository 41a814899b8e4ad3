//! # Performance Engine Library
//!
//! Multi-tenant sales performance scoring and gamification: KPI snapshots
//! and summaries, leaderboards, lead temperature, achievements and streaks,
//! penalties, bonuses, and the orchestrator and scheduler that drive them.

pub mod achievements;
pub mod activity;
pub mod alerts;
pub mod bonus;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod kpi;
pub mod lead_scoring;
pub mod leaderboard;
pub mod models;
pub mod orchestrator;
pub mod penalties;
pub mod period;
pub mod points;
pub mod repositories;
pub mod scheduler;
pub mod seeds;
pub mod summary;
pub mod telemetry;
pub use migration;
