//! # Leaderboard Repository
//!
//! Ranked entries per period and the all-time records table.

use crate::error::RepositoryError;
use crate::models::leaderboard_entry::{self, Entity as LeaderboardEntry, Medal, Model as EntryModel};
use crate::models::leaderboard_record::{self, Entity as LeaderboardRecord, Model as RecordModel};
use crate::period::{PeriodType, TimeWindow};
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use uuid::Uuid;

/// Medal tally across weekly and monthly boards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MedalCounts {
    pub gold: u64,
    pub silver: u64,
    pub bronze: u64,
}

impl MedalCounts {
    pub fn total(&self) -> u64 {
        self.gold + self.silver + self.bronze
    }
}

pub struct LeaderboardRepository<'a, C: ConnectionTrait> {
    db: &'a C,
    tenant_id: Uuid,
}

impl<'a, C: ConnectionTrait> LeaderboardRepository<'a, C> {
    pub fn new(db: &'a C, tenant_id: Uuid) -> Self {
        Self { db, tenant_id }
    }

    pub async fn find_entry(
        &self,
        user_id: Uuid,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> Result<Option<EntryModel>, RepositoryError> {
        LeaderboardEntry::find()
            .filter(leaderboard_entry::Column::TenantId.eq(self.tenant_id))
            .filter(leaderboard_entry::Column::UserId.eq(user_id))
            .filter(leaderboard_entry::Column::PeriodType.eq(period_type))
            .filter(leaderboard_entry::Column::PeriodStart.eq(period_start))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Insert a new entry or overwrite the existing one for the same user and period.
    pub async fn save_entry(
        &self,
        mut entry: leaderboard_entry::ActiveModel,
        existing: Option<EntryModel>,
    ) -> Result<EntryModel, RepositoryError> {
        entry.tenant_id = Set(self.tenant_id);
        match existing {
            Some(current) => {
                entry.id = Set(current.id);
                entry.update(self.db).await
            }
            None => entry.insert(self.db).await,
        }
        .map_err(RepositoryError::database_error)
    }

    /// Delete the entries of one board whose user is not in `keep`.
    pub async fn delete_entries_except(
        &self,
        period_type: PeriodType,
        period_start: NaiveDate,
        keep: &[Uuid],
    ) -> Result<u64, RepositoryError> {
        let result = LeaderboardEntry::delete_many()
            .filter(leaderboard_entry::Column::TenantId.eq(self.tenant_id))
            .filter(leaderboard_entry::Column::PeriodType.eq(period_type))
            .filter(leaderboard_entry::Column::PeriodStart.eq(period_start))
            .filter(leaderboard_entry::Column::UserId.is_not_in(keep.iter().copied()))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(result.rows_affected)
    }

    /// Ranked entries of one board, `limit` rows from the top when given.
    pub async fn ranked(
        &self,
        period_type: PeriodType,
        period_start: NaiveDate,
        limit: Option<u64>,
    ) -> Result<Vec<EntryModel>, RepositoryError> {
        let mut query = LeaderboardEntry::find()
            .filter(leaderboard_entry::Column::TenantId.eq(self.tenant_id))
            .filter(leaderboard_entry::Column::PeriodType.eq(period_type))
            .filter(leaderboard_entry::Column::PeriodStart.eq(period_start))
            .order_by_asc(leaderboard_entry::Column::Rank)
            .order_by_desc(leaderboard_entry::Column::WeightedScore)
            .order_by_asc(leaderboard_entry::Column::UserId);

        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        query
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Entries ranked within `[from_rank, to_rank]`.
    pub async fn rank_window(
        &self,
        period_type: PeriodType,
        period_start: NaiveDate,
        from_rank: i32,
        to_rank: i32,
    ) -> Result<Vec<EntryModel>, RepositoryError> {
        LeaderboardEntry::find()
            .filter(leaderboard_entry::Column::TenantId.eq(self.tenant_id))
            .filter(leaderboard_entry::Column::PeriodType.eq(period_type))
            .filter(leaderboard_entry::Column::PeriodStart.eq(period_start))
            .filter(leaderboard_entry::Column::Rank.gte(from_rank))
            .filter(leaderboard_entry::Column::Rank.lte(to_rank))
            .order_by_asc(leaderboard_entry::Column::Rank)
            .order_by_asc(leaderboard_entry::Column::UserId)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn medal_counts(&self, user_id: Uuid) -> Result<MedalCounts, RepositoryError> {
        Ok(MedalCounts {
            gold: self.count_medal(user_id, Medal::Gold, None).await?,
            silver: self.count_medal(user_id, Medal::Silver, None).await?,
            bronze: self.count_medal(user_id, Medal::Bronze, None).await?,
        })
    }

    /// Medals of one kind, optionally limited to entries refreshed inside `window`.
    pub async fn count_medal(
        &self,
        user_id: Uuid,
        medal: Medal,
        window: Option<TimeWindow>,
    ) -> Result<u64, RepositoryError> {
        let mut query = LeaderboardEntry::find()
            .filter(leaderboard_entry::Column::TenantId.eq(self.tenant_id))
            .filter(leaderboard_entry::Column::UserId.eq(user_id))
            .filter(leaderboard_entry::Column::Medal.eq(medal));

        if let Some(window) = window {
            query = query
                .filter(leaderboard_entry::Column::UpdatedAt.gte(window.from))
                .filter(leaderboard_entry::Column::UpdatedAt.lt(window.until));
        }

        query
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Boards of any period type the user has topped.
    pub async fn count_first_places(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        LeaderboardEntry::find()
            .filter(leaderboard_entry::Column::TenantId.eq(self.tenant_id))
            .filter(leaderboard_entry::Column::UserId.eq(user_id))
            .filter(leaderboard_entry::Column::Rank.eq(1))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_record(
        &self,
        record_type: &str,
    ) -> Result<Option<RecordModel>, RepositoryError> {
        LeaderboardRecord::find()
            .filter(leaderboard_record::Column::TenantId.eq(self.tenant_id))
            .filter(leaderboard_record::Column::RecordType.eq(record_type))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn list_records(&self) -> Result<Vec<RecordModel>, RepositoryError> {
        LeaderboardRecord::find()
            .filter(leaderboard_record::Column::TenantId.eq(self.tenant_id))
            .order_by_asc(leaderboard_record::Column::RecordType)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn save_record(
        &self,
        mut record: leaderboard_record::ActiveModel,
        existing: Option<RecordModel>,
    ) -> Result<RecordModel, RepositoryError> {
        record.tenant_id = Set(self.tenant_id);
        match existing {
            Some(current) => {
                record.id = Set(current.id);
                record.update(self.db).await
            }
            None => record.insert(self.db).await,
        }
        .map_err(RepositoryError::database_error)
    }
}
