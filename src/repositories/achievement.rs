//! # Achievement Repository
//!
//! Achievement definitions, awarded achievements and streak counters.

use crate::error::RepositoryError;
use crate::models::achievement_definition::{
    self, Entity as AchievementDefinition, Model as DefinitionModel,
};
use crate::models::user_achievement::{self, Entity as UserAchievement, Model as AwardModel};
use crate::models::user_streak::{self, Entity as UserStreak, Model as StreakModel};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

pub struct AchievementRepository<'a, C: ConnectionTrait> {
    db: &'a C,
    tenant_id: Uuid,
}

impl<'a, C: ConnectionTrait> AchievementRepository<'a, C> {
    pub fn new(db: &'a C, tenant_id: Uuid) -> Self {
        Self { db, tenant_id }
    }

    pub async fn active_definitions(&self) -> Result<Vec<DefinitionModel>, RepositoryError> {
        AchievementDefinition::find()
            .filter(achievement_definition::Column::TenantId.eq(self.tenant_id))
            .filter(achievement_definition::Column::IsActive.eq(true))
            .order_by_asc(achievement_definition::Column::Code)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_definition_by_code(
        &self,
        code: &str,
    ) -> Result<Option<DefinitionModel>, RepositoryError> {
        AchievementDefinition::find()
            .filter(achievement_definition::Column::TenantId.eq(self.tenant_id))
            .filter(achievement_definition::Column::Code.eq(code))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Insert a definition unless its code already exists.
    pub async fn create_definition(
        &self,
        mut definition: achievement_definition::ActiveModel,
        code: &str,
    ) -> Result<DefinitionModel, RepositoryError> {
        if let Some(existing) = self.find_definition_by_code(code).await? {
            return Ok(existing);
        }
        definition.id = Set(Uuid::new_v4());
        definition.tenant_id = Set(self.tenant_id);
        definition.code = Set(code.to_string());
        definition
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_award(
        &self,
        user_id: Uuid,
        achievement_id: Uuid,
    ) -> Result<Option<AwardModel>, RepositoryError> {
        UserAchievement::find()
            .filter(user_achievement::Column::TenantId.eq(self.tenant_id))
            .filter(user_achievement::Column::UserId.eq(user_id))
            .filter(user_achievement::Column::AchievementId.eq(achievement_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_award_by_id(
        &self,
        award_id: Uuid,
    ) -> Result<Option<AwardModel>, RepositoryError> {
        UserAchievement::find_by_id(award_id)
            .filter(user_achievement::Column::TenantId.eq(self.tenant_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn insert_award(
        &self,
        user_id: Uuid,
        achievement_id: Uuid,
        progress: f64,
    ) -> Result<AwardModel, RepositoryError> {
        let now = Utc::now();
        user_achievement::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(self.tenant_id),
            user_id: Set(user_id),
            achievement_id: Set(achievement_id),
            progress: Set(progress),
            times_earned: Set(1),
            earned_at: Set(now),
            is_seen: Set(false),
            is_pinned: Set(false),
            updated_at: Set(now),
        }
        .insert(self.db)
        .await
        .map_err(RepositoryError::database_error)
    }

    /// Record another earning of a repeatable achievement.
    pub async fn record_repeat(
        &self,
        award: AwardModel,
        progress: f64,
    ) -> Result<AwardModel, RepositoryError> {
        let now = Utc::now();
        let times_earned = award.times_earned + 1;
        let mut active = award.into_active_model();
        active.times_earned = Set(times_earned);
        active.progress = Set(progress);
        active.earned_at = Set(now);
        active.is_seen = Set(false);
        active.updated_at = Set(now);
        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// A user's awards with their definitions, newest first.
    pub async fn list_awards(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(AwardModel, Option<DefinitionModel>)>, RepositoryError> {
        UserAchievement::find()
            .find_also_related(AchievementDefinition)
            .filter(user_achievement::Column::TenantId.eq(self.tenant_id))
            .filter(user_achievement::Column::UserId.eq(user_id))
            .order_by_desc(user_achievement::Column::EarnedAt)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn set_seen(&self, award: AwardModel) -> Result<AwardModel, RepositoryError> {
        let mut active = award.into_active_model();
        active.is_seen = Set(true);
        active.updated_at = Set(Utc::now());
        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Mark every unseen award of a user as seen, returning how many changed.
    pub async fn set_all_seen(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        let result = UserAchievement::update_many()
            .col_expr(user_achievement::Column::IsSeen, Expr::value(true))
            .col_expr(user_achievement::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user_achievement::Column::TenantId.eq(self.tenant_id))
            .filter(user_achievement::Column::UserId.eq(user_id))
            .filter(user_achievement::Column::IsSeen.eq(false))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(result.rows_affected)
    }

    pub async fn count_pinned(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        UserAchievement::find()
            .filter(user_achievement::Column::TenantId.eq(self.tenant_id))
            .filter(user_achievement::Column::UserId.eq(user_id))
            .filter(user_achievement::Column::IsPinned.eq(true))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn set_pinned(
        &self,
        award: AwardModel,
        pinned: bool,
    ) -> Result<AwardModel, RepositoryError> {
        let mut active = award.into_active_model();
        active.is_pinned = Set(pinned);
        active.updated_at = Set(Utc::now());
        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_streak(
        &self,
        user_id: Uuid,
        streak_type: &str,
    ) -> Result<Option<StreakModel>, RepositoryError> {
        UserStreak::find()
            .filter(user_streak::Column::TenantId.eq(self.tenant_id))
            .filter(user_streak::Column::UserId.eq(user_id))
            .filter(user_streak::Column::StreakType.eq(streak_type))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn list_streaks(&self, user_id: Uuid) -> Result<Vec<StreakModel>, RepositoryError> {
        UserStreak::find()
            .filter(user_streak::Column::TenantId.eq(self.tenant_id))
            .filter(user_streak::Column::UserId.eq(user_id))
            .order_by_asc(user_streak::Column::StreakType)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Persist streak counters, creating the row on first use.
    pub async fn save_streak(
        &self,
        mut streak: user_streak::ActiveModel,
        existing: Option<StreakModel>,
    ) -> Result<StreakModel, RepositoryError> {
        streak.tenant_id = Set(self.tenant_id);
        streak.updated_at = Set(Utc::now());
        match existing {
            Some(current) => {
                streak.id = Set(current.id);
                streak.update(self.db).await
            }
            None => {
                streak.id = Set(Uuid::new_v4());
                streak.insert(self.db).await
            }
        }
        .map_err(RepositoryError::database_error)
    }
}
