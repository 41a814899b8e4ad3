//! # Penalty Repository
//!
//! Penalty rules, issued warnings and penalties.

use crate::error::RepositoryError;
use crate::models::penalty::{self, Entity as Penalty, Model as PenaltyModel, PenaltyStatus};
use crate::models::penalty_rule::{
    self, Entity as PenaltyRule, Model as RuleModel, RuleTriggerType,
};
use crate::models::penalty_warning::{self, Entity as PenaltyWarning, Model as WarningModel};
use crate::period::DateRange;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

/// The entity a violation is about, used as the dedup key with the rule and day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedEntity {
    pub kind: String,
    pub id: Uuid,
}

impl RelatedEntity {
    pub fn new(kind: &str, id: Uuid) -> Self {
        Self {
            kind: kind.to_string(),
            id,
        }
    }
}

pub struct PenaltyRepository<'a, C: ConnectionTrait> {
    db: &'a C,
    tenant_id: Uuid,
}

impl<'a, C: ConnectionTrait> PenaltyRepository<'a, C> {
    pub fn new(db: &'a C, tenant_id: Uuid) -> Self {
        Self { db, tenant_id }
    }

    /// Active rules evaluated by the sweep.
    pub async fn active_auto_rules(&self) -> Result<Vec<RuleModel>, RepositoryError> {
        PenaltyRule::find()
            .filter(penalty_rule::Column::TenantId.eq(self.tenant_id))
            .filter(penalty_rule::Column::IsActive.eq(true))
            .filter(penalty_rule::Column::TriggerType.eq(RuleTriggerType::Auto))
            .order_by_asc(penalty_rule::Column::Code)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_rule(&self, rule_id: Uuid) -> Result<Option<RuleModel>, RepositoryError> {
        PenaltyRule::find_by_id(rule_id)
            .filter(penalty_rule::Column::TenantId.eq(self.tenant_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_rule_by_code(&self, code: &str) -> Result<Option<RuleModel>, RepositoryError> {
        PenaltyRule::find()
            .filter(penalty_rule::Column::TenantId.eq(self.tenant_id))
            .filter(penalty_rule::Column::Code.eq(code))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Insert a rule unless its code already exists.
    pub async fn create_rule(
        &self,
        mut rule: penalty_rule::ActiveModel,
        code: &str,
    ) -> Result<RuleModel, RepositoryError> {
        if let Some(existing) = self.find_rule_by_code(code).await? {
            return Ok(existing);
        }
        rule.id = Set(Uuid::new_v4());
        rule.tenant_id = Set(self.tenant_id);
        rule.code = Set(code.to_string());
        rule.insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Whether the rule already produced a warning or penalty for this
    /// related entity and user on `day`.
    pub async fn issued_on(
        &self,
        rule_id: Uuid,
        user_id: Uuid,
        related: Option<&RelatedEntity>,
        day: NaiveDate,
    ) -> Result<bool, RepositoryError> {
        let mut warnings = PenaltyWarning::find()
            .filter(penalty_warning::Column::TenantId.eq(self.tenant_id))
            .filter(penalty_warning::Column::RuleId.eq(rule_id))
            .filter(penalty_warning::Column::UserId.eq(user_id))
            .filter(penalty_warning::Column::IssuedOn.eq(day));
        let mut penalties = Penalty::find()
            .filter(penalty::Column::TenantId.eq(self.tenant_id))
            .filter(penalty::Column::RuleId.eq(rule_id))
            .filter(penalty::Column::UserId.eq(user_id))
            .filter(penalty::Column::IssuedOn.eq(day));

        if let Some(related) = related {
            warnings = warnings
                .filter(penalty_warning::Column::RelatedType.eq(related.kind.clone()))
                .filter(penalty_warning::Column::RelatedId.eq(related.id));
            penalties = penalties
                .filter(penalty::Column::RelatedType.eq(related.kind.clone()))
                .filter(penalty::Column::RelatedId.eq(related.id));
        }

        let warning_count = warnings
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        if warning_count > 0 {
            return Ok(true);
        }

        let penalty_count = penalties
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(penalty_count > 0)
    }

    /// Warnings for the rule that have not expired at `now`.
    pub async fn count_valid_warnings(
        &self,
        user_id: Uuid,
        rule_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        PenaltyWarning::find()
            .filter(penalty_warning::Column::TenantId.eq(self.tenant_id))
            .filter(penalty_warning::Column::UserId.eq(user_id))
            .filter(penalty_warning::Column::RuleId.eq(rule_id))
            .filter(penalty_warning::Column::ExpiresAt.gt(now))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Penalties the rule issued to the user within `range`.
    pub async fn count_penalties(
        &self,
        user_id: Uuid,
        rule_id: Uuid,
        range: DateRange,
    ) -> Result<u64, RepositoryError> {
        Penalty::find()
            .filter(penalty::Column::TenantId.eq(self.tenant_id))
            .filter(penalty::Column::UserId.eq(user_id))
            .filter(penalty::Column::RuleId.eq(rule_id))
            .filter(penalty::Column::IssuedOn.gte(range.start))
            .filter(penalty::Column::IssuedOn.lte(range.end))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn insert_warning(
        &self,
        mut warning: penalty_warning::ActiveModel,
    ) -> Result<WarningModel, RepositoryError> {
        warning.id = Set(Uuid::new_v4());
        warning.tenant_id = Set(self.tenant_id);
        warning
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn insert_penalty(
        &self,
        mut penalty: penalty::ActiveModel,
    ) -> Result<PenaltyModel, RepositoryError> {
        penalty.id = Set(Uuid::new_v4());
        penalty.tenant_id = Set(self.tenant_id);
        penalty
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_penalty(
        &self,
        penalty_id: Uuid,
    ) -> Result<Option<PenaltyModel>, RepositoryError> {
        Penalty::find_by_id(penalty_id)
            .filter(penalty::Column::TenantId.eq(self.tenant_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn update_penalty(
        &self,
        penalty: penalty::ActiveModel,
    ) -> Result<PenaltyModel, RepositoryError> {
        penalty
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Penalties that stand (confirmed, or appeal rejected) inside `range`
    /// and are not yet deducted from any bonus.
    pub async fn deductible(
        &self,
        user_id: Uuid,
        range: DateRange,
    ) -> Result<Vec<PenaltyModel>, RepositoryError> {
        Penalty::find()
            .filter(penalty::Column::TenantId.eq(self.tenant_id))
            .filter(penalty::Column::UserId.eq(user_id))
            .filter(
                penalty::Column::Status
                    .is_in([PenaltyStatus::Confirmed, PenaltyStatus::AppealRejected]),
            )
            .filter(penalty::Column::DeductedFromBonusId.is_null())
            .filter(penalty::Column::IssuedOn.gte(range.start))
            .filter(penalty::Column::IssuedOn.lte(range.end))
            .order_by_asc(penalty::Column::TriggeredAt)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Link a penalty to a bonus if it is still unlinked. Returns whether this
    /// call made the link.
    pub async fn link_to_bonus(
        &self,
        penalty_id: Uuid,
        bonus_id: Uuid,
    ) -> Result<bool, RepositoryError> {
        let result = Penalty::update_many()
            .col_expr(penalty::Column::DeductedFromBonusId, Expr::value(bonus_id))
            .col_expr(penalty::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(penalty::Column::TenantId.eq(self.tenant_id))
            .filter(penalty::Column::Id.eq(penalty_id))
            .filter(penalty::Column::DeductedFromBonusId.is_null())
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(result.rows_affected == 1)
    }

    /// Penalties already attributed to one bonus calculation.
    pub async fn linked_to_bonus(
        &self,
        bonus_id: Uuid,
    ) -> Result<Vec<PenaltyModel>, RepositoryError> {
        Penalty::find()
            .filter(penalty::Column::TenantId.eq(self.tenant_id))
            .filter(penalty::Column::DeductedFromBonusId.eq(bonus_id))
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn penalties_for_user(
        &self,
        user_id: Uuid,
        range: Option<DateRange>,
    ) -> Result<Vec<PenaltyModel>, RepositoryError> {
        let mut query = Penalty::find()
            .filter(penalty::Column::TenantId.eq(self.tenant_id))
            .filter(penalty::Column::UserId.eq(user_id));
        if let Some(range) = range {
            query = query
                .filter(penalty::Column::IssuedOn.gte(range.start))
                .filter(penalty::Column::IssuedOn.lte(range.end));
        }
        query
            .order_by_desc(penalty::Column::TriggeredAt)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Penalties in one status, oldest first.
    pub async fn with_status(
        &self,
        status: PenaltyStatus,
    ) -> Result<Vec<PenaltyModel>, RepositoryError> {
        Penalty::find()
            .filter(penalty::Column::TenantId.eq(self.tenant_id))
            .filter(penalty::Column::Status.eq(status))
            .order_by_asc(penalty::Column::UpdatedAt)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn warnings_for_user(
        &self,
        user_id: Uuid,
        since: NaiveDate,
    ) -> Result<Vec<WarningModel>, RepositoryError> {
        PenaltyWarning::find()
            .filter(penalty_warning::Column::TenantId.eq(self.tenant_id))
            .filter(penalty_warning::Column::UserId.eq(user_id))
            .filter(penalty_warning::Column::IssuedOn.gte(since))
            .order_by_desc(penalty_warning::Column::CreatedAt)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Unexpired warnings across the tenant, newest first.
    pub async fn valid_warnings(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<WarningModel>, RepositoryError> {
        PenaltyWarning::find()
            .filter(penalty_warning::Column::TenantId.eq(self.tenant_id))
            .filter(penalty_warning::Column::ExpiresAt.gt(now))
            .order_by_desc(penalty_warning::Column::CreatedAt)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
