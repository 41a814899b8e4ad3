//! # Points Ledger
//!
//! Credits points for achievements, podium finishes and CRM actions, keeps
//! each user's level and medal tally, and rejects a second credit for the
//! same source key so replays and re-run sweeps never pay twice.

pub mod levels;

use chrono::NaiveDate;
use metrics::counter;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::EngineError;
use crate::leaderboard::ranking;
use crate::models::leaderboard_entry::Medal;
use crate::models::points_transaction::Model as TransactionModel;
use crate::models::user_points::{self, Model as PointsModel};
use crate::period::PeriodType;
use crate::repositories::points::medal_column;
use crate::repositories::{LeaderboardRepository, PointsRepository};

pub use levels::{LevelProgress, level_for, level_progress};

/// What a credit is for. Each source maps to a unique key per user.
#[derive(Debug, Clone, PartialEq)]
pub enum PointsSource {
    Achievement {
        code: String,
        times_earned: i32,
    },
    Medal {
        medal: Medal,
        rank: i32,
        period_type: PeriodType,
        period_start: NaiveDate,
    },
    Action {
        action: String,
        key: Uuid,
    },
}

impl PointsSource {
    pub fn source(&self) -> &str {
        match self {
            PointsSource::Achievement { .. } => "achievement",
            PointsSource::Medal { .. } => "medal",
            PointsSource::Action { action, .. } => action,
        }
    }

    pub fn key(&self) -> String {
        match self {
            PointsSource::Achievement { code, times_earned } => format!("{code}:{times_earned}"),
            PointsSource::Medal {
                period_type,
                period_start,
                ..
            } => format!("{period_type}:{period_start}"),
            PointsSource::Action { key, .. } => key.to_string(),
        }
    }
}

/// A credit that went through.
#[derive(Debug, Clone, Serialize)]
pub struct PointsCredit {
    pub balance: PointsModel,
    pub transaction: TransactionModel,
    pub leveled_up: bool,
}

#[derive(Clone)]
pub struct PointsLedger {
    db: DatabaseConnection,
}

impl PointsLedger {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Credit `points` to a user. Returns `None` when this source key was
    /// already credited.
    #[instrument(skip(self, description), fields(tenant_id = %tenant_id, user_id = %user_id))]
    pub async fn add_points(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        source: &PointsSource,
        points: i64,
        description: Option<String>,
    ) -> Result<Option<PointsCredit>, EngineError> {
        let txn = self.db.begin().await?;
        let repo = PointsRepository::new(&txn, tenant_id);
        repo.ensure_balance(user_id).await?;
        repo.add_to_total(user_id, points).await?;
        match source {
            PointsSource::Achievement { .. } => {
                repo.increment_tally(user_id, user_points::Column::AchievementsCount)
                    .await?
            }
            PointsSource::Medal { medal, .. } => {
                repo.increment_tally(user_id, medal_column(*medal)).await?
            }
            PointsSource::Action { .. } => {}
        }
        let balance = repo
            .find(user_id)
            .await?
            .ok_or_else(|| EngineError::not_found("points balance", user_id))?;

        let transaction = match repo
            .insert_transaction(
                user_id,
                source.source(),
                &source.key(),
                points,
                balance.total_points,
                description,
            )
            .await
        {
            Ok(transaction) => transaction,
            Err(err) if err.is_unique_violation() => {
                txn.rollback().await?;
                debug!(source = source.source(), key = %source.key(), "Points already credited");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let level = levels::level_for(balance.total_points);
        let leveled_up = level > balance.level;
        let best_rank = match source {
            PointsSource::Medal { rank, .. } => {
                Some(balance.best_rank.map_or(*rank, |best| best.min(*rank)))
            }
            _ => balance.best_rank,
        };
        let balance = repo
            .set_level_and_best_rank(balance, level, best_rank)
            .await?;
        txn.commit().await?;

        counter!("points_credited_total", "source" => source_label(source)).increment(1);
        if leveled_up {
            counter!("points_level_ups_total").increment(1);
            info!(
                tenant_id = %tenant_id,
                user_id = %user_id,
                level,
                total_points = balance.total_points,
                "Level up"
            );
        }

        Ok(Some(PointsCredit {
            balance,
            transaction,
            leveled_up,
        }))
    }

    /// Credit the points of an achievement earning.
    pub async fn credit_achievement(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        code: &str,
        times_earned: i32,
        points: i32,
    ) -> Result<Option<PointsCredit>, EngineError> {
        let source = PointsSource::Achievement {
            code: code.to_string(),
            times_earned,
        };
        self.add_points(
            tenant_id,
            user_id,
            &source,
            points as i64,
            Some(format!("Achievement {code}")),
        )
        .await
    }

    /// Credit a CRM action such as a converted lead or a completed task.
    pub async fn credit_action(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        action: &str,
        key: Uuid,
        value: f64,
    ) -> Result<Option<PointsCredit>, EngineError> {
        let source = PointsSource::Action {
            action: action.to_string(),
            key,
        };
        self.add_points(
            tenant_id,
            user_id,
            &source,
            levels::action_points(action, value),
            None,
        )
        .await
    }

    /// Pay the medals of a closed board. Repeating it for the same board
    /// credits nothing.
    #[instrument(skip(self))]
    pub async fn settle_medals(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> Result<usize, EngineError> {
        if !period_type.awards_medals() {
            return Ok(0);
        }
        let entries = LeaderboardRepository::new(&self.db, tenant_id)
            .ranked(period_type, period_start, None)
            .await?;

        let mut credited = 0;
        for entry in entries {
            let Some(medal) = ranking::medal_for(period_type, entry.rank) else {
                continue;
            };
            let source = PointsSource::Medal {
                medal,
                rank: entry.rank,
                period_type,
                period_start,
            };
            let description = Some(format!(
                "{period_type} board from {period_start}, rank {}",
                entry.rank
            ));
            if self
                .add_points(
                    tenant_id,
                    entry.user_id,
                    &source,
                    levels::medal_points(medal),
                    description,
                )
                .await?
                .is_some()
            {
                credited += 1;
            }
        }

        if credited > 0 {
            info!(
                tenant_id = %tenant_id,
                period_type = %period_type,
                period_start = %period_start,
                credited,
                "Medals settled"
            );
        }
        Ok(credited)
    }

    pub async fn balance(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<PointsModel>, EngineError> {
        Ok(PointsRepository::new(&self.db, tenant_id)
            .find(user_id)
            .await?)
    }

    /// Level of a user; 1 when nothing was ever credited.
    pub async fn level(&self, tenant_id: Uuid, user_id: Uuid) -> Result<i32, EngineError> {
        Ok(self
            .balance(tenant_id, user_id)
            .await?
            .map(|balance| balance.level)
            .unwrap_or(1))
    }

    pub async fn progress(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<LevelProgress, EngineError> {
        let total = self
            .balance(tenant_id, user_id)
            .await?
            .map(|balance| balance.total_points)
            .unwrap_or(0);
        Ok(levels::level_progress(total))
    }

    pub async fn history(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        limit: u64,
    ) -> Result<Vec<TransactionModel>, EngineError> {
        Ok(PointsRepository::new(&self.db, tenant_id)
            .transactions(user_id, limit)
            .await?)
    }

    pub async fn standings(
        &self,
        tenant_id: Uuid,
        limit: u64,
    ) -> Result<Vec<PointsModel>, EngineError> {
        Ok(PointsRepository::new(&self.db, tenant_id)
            .standings(limit)
            .await?)
    }
}

fn source_label(source: &PointsSource) -> &'static str {
    match source {
        PointsSource::Achievement { .. } => "achievement",
        PointsSource::Medal { .. } => "medal",
        PointsSource::Action { .. } => "action",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_keys() {
        let achievement = PointsSource::Achievement {
            code: "first_sale".to_string(),
            times_earned: 2,
        };
        assert_eq!(achievement.source(), "achievement");
        assert_eq!(achievement.key(), "first_sale:2");

        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap_or_default();
        let medal = PointsSource::Medal {
            medal: Medal::Gold,
            rank: 1,
            period_type: PeriodType::Monthly,
            period_start: start,
        };
        assert_eq!(medal.key(), "monthly:2026-03-01");

        let key = Uuid::new_v4();
        let action = PointsSource::Action {
            action: "task_completed".to_string(),
            key,
        };
        assert_eq!(action.source(), "task_completed");
        assert_eq!(action.key(), key.to_string());
    }
}
