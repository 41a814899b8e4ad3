//! SeaORM-backed [`ActivitySource`] over the `crm_*` and team tables.

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use super::{ActivitySource, LeadFilter, OutcomeStages, TaskFilter};
use crate::error::{EngineError, RepositoryError};
use crate::models::{crm_call, crm_lead, crm_task, pipeline_stage, team_member};
use crate::period::TimeWindow;

const CLOSED_TASK_STATUSES: [&str; 2] = ["completed", "cancelled"];

/// Reads activity facts from the shared database.
#[derive(Clone)]
pub struct SqlActivitySource {
    db: DatabaseConnection,
}

impl SqlActivitySource {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn db_err(err: sea_orm::DbErr) -> EngineError {
    RepositoryError::database_error(err).into()
}

#[async_trait]
impl ActivitySource for SqlActivitySource {
    async fn sales_team(&self, tenant_id: Uuid) -> Result<Vec<team_member::Model>, EngineError> {
        team_member::Entity::find()
            .filter(team_member::Column::TenantId.eq(tenant_id))
            .filter(team_member::Column::IsActive.eq(true))
            .order_by_asc(team_member::Column::JoinedAt)
            .all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn outcome_stages(&self, tenant_id: Uuid) -> Result<OutcomeStages, EngineError> {
        let stages = pipeline_stage::Entity::find()
            .filter(pipeline_stage::Column::TenantId.eq(tenant_id))
            .filter(
                Condition::any()
                    .add(pipeline_stage::Column::IsWon.eq(true))
                    .add(pipeline_stage::Column::IsLost.eq(true)),
            )
            .order_by_asc(pipeline_stage::Column::SortOrder)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(OutcomeStages {
            won: stages.iter().find(|s| s.is_won).map(|s| s.slug.clone()),
            lost: stages.iter().find(|s| s.is_lost).map(|s| s.slug.clone()),
        })
    }

    async fn leads(
        &self,
        tenant_id: Uuid,
        filter: &LeadFilter,
    ) -> Result<Vec<crm_lead::Model>, EngineError> {
        let mut query = crm_lead::Entity::find().filter(crm_lead::Column::TenantId.eq(tenant_id));

        if let Some(user_id) = filter.assigned_to {
            query = query.filter(crm_lead::Column::AssignedTo.eq(user_id));
        }
        if filter.assigned_only {
            query = query.filter(crm_lead::Column::AssignedTo.is_not_null());
        }
        if let Some(statuses) = &filter.statuses {
            query = query.filter(crm_lead::Column::Status.is_in(statuses.clone()));
        }
        if let Some(window) = filter.created_in {
            query = query
                .filter(crm_lead::Column::CreatedAt.gte(window.from))
                .filter(crm_lead::Column::CreatedAt.lt(window.until));
        }
        if let Some(before) = filter.created_before {
            query = query.filter(crm_lead::Column::CreatedAt.lt(before));
        }
        if let Some(window) = filter.updated_in {
            query = query
                .filter(crm_lead::Column::UpdatedAt.gte(window.from))
                .filter(crm_lead::Column::UpdatedAt.lt(window.until));
        }
        if filter.never_contacted {
            query = query.filter(crm_lead::Column::LastContactedAt.is_null());
        }

        query
            .order_by_asc(crm_lead::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn lead(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Option<crm_lead::Model>, EngineError> {
        crm_lead::Entity::find_by_id(lead_id)
            .filter(crm_lead::Column::TenantId.eq(tenant_id))
            .one(&self.db)
            .await
            .map_err(db_err)
    }

    async fn calls(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        window: Option<TimeWindow>,
    ) -> Result<Vec<crm_call::Model>, EngineError> {
        let mut query = crm_call::Entity::find()
            .filter(crm_call::Column::TenantId.eq(tenant_id))
            .filter(crm_call::Column::UserId.eq(user_id));

        if let Some(window) = window {
            query = query
                .filter(crm_call::Column::StartedAt.gte(window.from))
                .filter(crm_call::Column::StartedAt.lt(window.until));
        }

        query
            .order_by_asc(crm_call::Column::StartedAt)
            .all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn tasks(
        &self,
        tenant_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<crm_task::Model>, EngineError> {
        let mut query = crm_task::Entity::find().filter(crm_task::Column::TenantId.eq(tenant_id));

        if let Some(user_id) = filter.assigned_to {
            query = query.filter(crm_task::Column::AssignedTo.eq(user_id));
        }
        if filter.assigned_only {
            query = query.filter(crm_task::Column::AssignedTo.is_not_null());
        }
        if filter.completed_only {
            query = query.filter(crm_task::Column::Status.eq("completed"));
        }
        if let Some(window) = filter.completed_in {
            query = query
                .filter(crm_task::Column::Status.eq("completed"))
                .filter(crm_task::Column::CompletedAt.gte(window.from))
                .filter(crm_task::Column::CompletedAt.lt(window.until));
        }
        if let Some(before) = filter.open_due_before {
            query = query
                .filter(crm_task::Column::Status.is_not_in(CLOSED_TASK_STATUSES))
                .filter(crm_task::Column::DueAt.lt(before));
        }

        query
            .order_by_asc(crm_task::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)
    }
}
