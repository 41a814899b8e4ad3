//! # Lead Score Repository
//!
//! Scoring rules, current lead temperatures and their change log.

use crate::error::RepositoryError;
use crate::models::lead_score::{self, Entity as LeadScore, LeadTemperature, Model as ScoreModel};
use crate::models::lead_score_history::{self, Entity as LeadScoreHistory, Model as HistoryModel};
use crate::models::lead_scoring_rule::{self, Entity as LeadScoringRule, Model as RuleModel};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

pub struct LeadScoreRepository<'a, C: ConnectionTrait> {
    db: &'a C,
    tenant_id: Uuid,
}

impl<'a, C: ConnectionTrait> LeadScoreRepository<'a, C> {
    pub fn new(db: &'a C, tenant_id: Uuid) -> Self {
        Self { db, tenant_id }
    }

    pub async fn active_rules(&self) -> Result<Vec<RuleModel>, RepositoryError> {
        LeadScoringRule::find()
            .filter(lead_scoring_rule::Column::TenantId.eq(self.tenant_id))
            .filter(lead_scoring_rule::Column::IsActive.eq(true))
            .order_by_asc(lead_scoring_rule::Column::SortOrder)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn count_rules(&self) -> Result<u64, RepositoryError> {
        LeadScoringRule::find()
            .filter(lead_scoring_rule::Column::TenantId.eq(self.tenant_id))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn insert_rule(
        &self,
        mut rule: lead_scoring_rule::ActiveModel,
    ) -> Result<RuleModel, RepositoryError> {
        rule.id = Set(Uuid::new_v4());
        rule.tenant_id = Set(self.tenant_id);
        rule.insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_score(&self, lead_id: Uuid) -> Result<Option<ScoreModel>, RepositoryError> {
        LeadScore::find()
            .filter(lead_score::Column::TenantId.eq(self.tenant_id))
            .filter(lead_score::Column::LeadId.eq(lead_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Write the current score for a lead, replacing `existing` when present.
    pub async fn save_score(
        &self,
        lead_id: Uuid,
        score: i32,
        breakdown: serde_json::Value,
        scored_at: DateTime<Utc>,
        existing: Option<&ScoreModel>,
    ) -> Result<ScoreModel, RepositoryError> {
        let active = lead_score::ActiveModel {
            id: Set(existing.map(|e| e.id).unwrap_or_else(Uuid::new_v4)),
            tenant_id: Set(self.tenant_id),
            lead_id: Set(lead_id),
            score: Set(score),
            category: Set(LeadTemperature::from_score(score)),
            breakdown: Set(breakdown),
            scored_at: Set(scored_at),
        };
        let result = match existing {
            Some(_) => active.update(self.db).await,
            None => active.insert(self.db).await,
        };
        result.map_err(RepositoryError::database_error)
    }

    /// Scores at or above `min_score`, hottest first.
    pub async fn list_scores(
        &self,
        min_score: i32,
        limit: u64,
    ) -> Result<Vec<ScoreModel>, RepositoryError> {
        LeadScore::find()
            .filter(lead_score::Column::TenantId.eq(self.tenant_id))
            .filter(lead_score::Column::Score.gte(min_score))
            .order_by_desc(lead_score::Column::Score)
            .limit(limit)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Positive scores last written before `cutoff`; the decay candidates.
    pub async fn scored_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ScoreModel>, RepositoryError> {
        LeadScore::find()
            .filter(lead_score::Column::TenantId.eq(self.tenant_id))
            .filter(lead_score::Column::Score.gt(0))
            .filter(lead_score::Column::ScoredAt.lt(cutoff))
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn insert_history(
        &self,
        lead_id: Uuid,
        old: (i32, LeadTemperature),
        new: (i32, LeadTemperature),
        reason: &str,
    ) -> Result<HistoryModel, RepositoryError> {
        lead_score_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(self.tenant_id),
            lead_id: Set(lead_id),
            old_score: Set(old.0),
            new_score: Set(new.0),
            old_category: Set(old.1),
            new_category: Set(new.1),
            reason: Set(reason.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(self.db)
        .await
        .map_err(RepositoryError::database_error)
    }

    pub async fn history(&self, lead_id: Uuid) -> Result<Vec<HistoryModel>, RepositoryError> {
        LeadScoreHistory::find()
            .filter(lead_score_history::Column::TenantId.eq(self.tenant_id))
            .filter(lead_score_history::Column::LeadId.eq(lead_id))
            .order_by_asc(lead_score_history::Column::CreatedAt)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
