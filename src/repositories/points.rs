//! # Points Repository
//!
//! Per-user points balances and the credit log behind them.

use crate::error::RepositoryError;
use crate::models::leaderboard_entry::Medal;
use crate::models::points_transaction::{self, Entity as PointsTransaction, Model as TransactionModel};
use crate::models::user_points::{self, Entity as UserPoints, Model as PointsModel};
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

pub struct PointsRepository<'a, C: ConnectionTrait> {
    db: &'a C,
    tenant_id: Uuid,
}

impl<'a, C: ConnectionTrait> PointsRepository<'a, C> {
    pub fn new(db: &'a C, tenant_id: Uuid) -> Self {
        Self { db, tenant_id }
    }

    pub async fn find(&self, user_id: Uuid) -> Result<Option<PointsModel>, RepositoryError> {
        UserPoints::find()
            .filter(user_points::Column::TenantId.eq(self.tenant_id))
            .filter(user_points::Column::UserId.eq(user_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Create the user's zero balance if it does not exist yet.
    pub async fn ensure_balance(&self, user_id: Uuid) -> Result<(), RepositoryError> {
        let model = user_points::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(self.tenant_id),
            user_id: Set(user_id),
            total_points: Set(0),
            level: Set(1),
            achievements_count: Set(0),
            gold_medals: Set(0),
            silver_medals: Set(0),
            bronze_medals: Set(0),
            best_rank: Set(None),
            updated_at: Set(Utc::now()),
        };

        UserPoints::insert(model)
            .on_conflict(
                OnConflict::columns([user_points::Column::TenantId, user_points::Column::UserId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(())
    }

    /// `total_points += points` as one UPDATE statement.
    pub async fn add_to_total(&self, user_id: Uuid, points: i64) -> Result<u64, RepositoryError> {
        let result = UserPoints::update_many()
            .col_expr(
                user_points::Column::TotalPoints,
                Expr::col(user_points::Column::TotalPoints).add(points),
            )
            .col_expr(user_points::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user_points::Column::TenantId.eq(self.tenant_id))
            .filter(user_points::Column::UserId.eq(user_id))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(result.rows_affected)
    }

    /// Bump one of the tally columns by one.
    pub async fn increment_tally(
        &self,
        user_id: Uuid,
        column: user_points::Column,
    ) -> Result<(), RepositoryError> {
        UserPoints::update_many()
            .col_expr(column, Expr::col(column).add(1))
            .filter(user_points::Column::TenantId.eq(self.tenant_id))
            .filter(user_points::Column::UserId.eq(user_id))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(())
    }

    pub async fn set_level_and_best_rank(
        &self,
        balance: PointsModel,
        level: i32,
        best_rank: Option<i32>,
    ) -> Result<PointsModel, RepositoryError> {
        if balance.level == level && balance.best_rank == best_rank {
            return Ok(balance);
        }
        let mut active = balance.into_active_model();
        active.level = Set(level);
        active.best_rank = Set(best_rank);
        active.updated_at = Set(Utc::now());
        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Append a credit. Fails with a unique violation when the same source
    /// key was already credited to the user.
    pub async fn insert_transaction(
        &self,
        user_id: Uuid,
        source: &str,
        source_key: &str,
        points: i64,
        balance_after: i64,
        description: Option<String>,
    ) -> Result<TransactionModel, RepositoryError> {
        points_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(self.tenant_id),
            user_id: Set(user_id),
            source: Set(source.to_string()),
            source_key: Set(source_key.to_string()),
            points: Set(points),
            balance_after: Set(balance_after),
            description: Set(description),
            created_at: Set(Utc::now()),
        }
        .insert(self.db)
        .await
        .map_err(RepositoryError::database_error)
    }

    /// Latest credits of a user, newest first.
    pub async fn transactions(
        &self,
        user_id: Uuid,
        limit: u64,
    ) -> Result<Vec<TransactionModel>, RepositoryError> {
        PointsTransaction::find()
            .filter(points_transaction::Column::TenantId.eq(self.tenant_id))
            .filter(points_transaction::Column::UserId.eq(user_id))
            .order_by_desc(points_transaction::Column::CreatedAt)
            .limit(limit)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Balances ordered by points, highest first.
    pub async fn standings(&self, limit: u64) -> Result<Vec<PointsModel>, RepositoryError> {
        UserPoints::find()
            .filter(user_points::Column::TenantId.eq(self.tenant_id))
            .order_by_desc(user_points::Column::TotalPoints)
            .order_by_asc(user_points::Column::UserId)
            .limit(limit)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}

/// Tally column counting one kind of medal.
pub fn medal_column(medal: Medal) -> user_points::Column {
    match medal {
        Medal::Gold => user_points::Column::GoldMedals,
        Medal::Silver => user_points::Column::SilverMedals,
        Medal::Bronze => user_points::Column::BronzeMedals,
    }
}
