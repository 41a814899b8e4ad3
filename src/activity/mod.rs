//! # Activity Facts
//!
//! Read-only view of the CRM facts the engine scores: the sales team, leads,
//! calls and tasks. The engine never writes through this interface.

pub mod sql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{crm_call, crm_lead, crm_task, team_member};
use crate::period::TimeWindow;

pub use sql::SqlActivitySource;

/// Pipeline stage slugs that close a lead. Either may be missing when the
/// tenant has not configured its pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeStages {
    pub won: Option<String>,
    pub lost: Option<String>,
}

impl OutcomeStages {
    pub fn is_won(&self, status: &str) -> bool {
        self.won.as_deref() == Some(status)
    }

    pub fn is_lost(&self, status: &str) -> bool {
        self.lost.as_deref() == Some(status)
    }

    pub fn is_closed(&self, status: &str) -> bool {
        self.is_won(status) || self.is_lost(status)
    }
}

/// Lead selection. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub assigned_to: Option<Uuid>,
    /// Only leads that have an assignee
    pub assigned_only: bool,
    pub statuses: Option<Vec<String>>,
    pub created_in: Option<TimeWindow>,
    pub created_before: Option<DateTime<Utc>>,
    pub updated_in: Option<TimeWindow>,
    pub never_contacted: bool,
}

impl LeadFilter {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            assigned_to: Some(user_id),
            ..Default::default()
        }
    }
}

/// Task selection. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub assigned_to: Option<Uuid>,
    pub assigned_only: bool,
    pub completed_in: Option<TimeWindow>,
    /// Open tasks (neither completed nor cancelled) due before this instant
    pub open_due_before: Option<DateTime<Utc>>,
    pub completed_only: bool,
}

/// Source of activity facts for one tenant at a time.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Active sales team members.
    async fn sales_team(&self, tenant_id: Uuid) -> Result<Vec<team_member::Model>, EngineError>;

    async fn outcome_stages(&self, tenant_id: Uuid) -> Result<OutcomeStages, EngineError>;

    async fn leads(
        &self,
        tenant_id: Uuid,
        filter: &LeadFilter,
    ) -> Result<Vec<crm_lead::Model>, EngineError>;

    async fn lead(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Option<crm_lead::Model>, EngineError>;

    /// Calls placed by `user_id`; `None` window means all time.
    async fn calls(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        window: Option<TimeWindow>,
    ) -> Result<Vec<crm_call::Model>, EngineError>;

    async fn tasks(
        &self,
        tenant_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<crm_task::Model>, EngineError>;
}
