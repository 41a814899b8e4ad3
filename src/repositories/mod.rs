//! # Repository Layer
//!
//! Data access for the engine tables. Every repository is bound to one
//! tenant at construction and adds the tenant predicate to each query it
//! issues. The only way to look across tenants is [`TenantDirectory`], which
//! exists for the scheduled batch jobs.
//!
//! Repositories are generic over [`sea_orm::ConnectionTrait`] so the same
//! code runs on the pool or inside a transaction.

pub mod achievement;
pub mod alert;
pub mod bonus;
pub mod leaderboard;
pub mod lead_score;
pub mod metric;
pub mod penalty;
pub mod points;
pub mod snapshot;
pub mod tenant;

pub use achievement::AchievementRepository;
pub use alert::AlertRepository;
pub use bonus::BonusRepository;
pub use lead_score::LeadScoreRepository;
pub use leaderboard::LeaderboardRepository;
pub use metric::MetricRepository;
pub use penalty::PenaltyRepository;
pub use points::PointsRepository;
pub use snapshot::SnapshotRepository;
pub use tenant::TenantDirectory;
