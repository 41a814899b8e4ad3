//! Test utilities for database testing.
//!
//! In-memory SQLite with every migration applied, an engine wired to a
//! recording alert sink, and fixture builders for the CRM fact tables.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use migration::{Migrator, MigratorTrait};
use performance_engine::{
    activity::{ActivitySource, SqlActivitySource},
    alerts::{Alert, AlertSink},
    config::EngineConfig,
    engine::PerformanceEngine,
    error::EngineError,
    models::{crm_lead, crm_task, pipeline_stage, team_member},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Set, sea_query::Expr,
};
use uuid::Uuid;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    // One connection: every in-memory connection would be its own database.
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await?;

    Migrator::up(&db, None).await?;
    Ok(db)
}

/// File-backed SQLite with several pooled connections, for tests that need
/// real concurrency. Writers wait on each other through the busy timeout.
pub async fn setup_file_db(path: &std::path::Path) -> Result<DatabaseConnection> {
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let mut options = ConnectOptions::new(url);
    options.max_connections(4).sqlx_logging(false);
    let db = Database::connect(options).await?;

    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Records every alert instead of writing it to the outbox.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(Uuid, DateTime<Utc>, Alert)>>,
}

impl RecordingSink {
    pub fn alerts(&self) -> Vec<Alert> {
        self.sent
            .lock()
            .map(|sent| sent.iter().map(|(_, _, alert)| alert.clone()).collect())
            .unwrap_or_default()
    }

    pub fn of_type(&self, alert_type: &str) -> Vec<Alert> {
        self.alerts()
            .into_iter()
            .filter(|alert| alert.alert_type == alert_type)
            .collect()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn send(&self, tenant_id: Uuid, alert: Alert) -> Result<(), EngineError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((tenant_id, Utc::now(), alert));
        }
        Ok(())
    }

    async fn sent_since(
        &self,
        tenant_id: Uuid,
        alert_type: &str,
        subject_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        Ok(self
            .sent
            .lock()
            .map(|sent| {
                sent.iter().any(|(tenant, at, alert)| {
                    *tenant == tenant_id
                        && alert.alert_type == alert_type
                        && alert.subject_id == Some(subject_id)
                        && *at >= since
                })
            })
            .unwrap_or(false))
    }
}

/// Rejects every alert.
pub struct FailingSink;

#[async_trait]
impl AlertSink for FailingSink {
    async fn send(&self, _tenant_id: Uuid, _alert: Alert) -> Result<(), EngineError> {
        Err(EngineError::Validation("alert channel unavailable".to_string()))
    }
}

pub struct TestEngine {
    pub db: DatabaseConnection,
    pub engine: PerformanceEngine,
    pub alerts: Arc<RecordingSink>,
    pub tenant_id: Uuid,
}

/// Fresh database, engine and bootstrapped tenant.
pub async fn setup_engine() -> Result<TestEngine> {
    setup_engine_with(EngineConfig::default()).await
}

pub async fn setup_engine_with(config: EngineConfig) -> Result<TestEngine> {
    let db = setup_test_db().await?;
    let alerts = Arc::new(RecordingSink::default());
    let engine = engine_with_sink(&db, config, alerts.clone());
    let (tenant, _) = engine.create_tenant("Acme Sales").await?;
    Ok(TestEngine {
        db,
        engine,
        alerts,
        tenant_id: tenant.id,
    })
}

pub fn engine_with_sink(
    db: &DatabaseConnection,
    config: EngineConfig,
    sink: Arc<dyn AlertSink>,
) -> PerformanceEngine {
    let activity: Arc<dyn ActivitySource> = Arc::new(SqlActivitySource::new(db.clone()));
    PerformanceEngine::with_collaborators(db.clone(), config, activity, sink)
}

/// Adds an active sales team member and returns its user id.
pub async fn add_member(db: &DatabaseConnection, tenant_id: Uuid, name: &str) -> Result<Uuid> {
    add_member_joined(db, tenant_id, name, Utc::now()).await
}

pub async fn add_member_joined(
    db: &DatabaseConnection,
    tenant_id: Uuid,
    name: &str,
    joined_at: DateTime<Utc>,
) -> Result<Uuid> {
    let user_id = Uuid::new_v4();
    team_member::ActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(tenant_id),
        user_id: Set(user_id),
        display_name: Set(Some(name.to_string())),
        role: Set("sales".to_string()),
        is_active: Set(true),
        joined_at: Set(joined_at),
    }
    .insert(db)
    .await?;
    Ok(user_id)
}

/// Marks a member as having left the sales team.
pub async fn deactivate_member(
    db: &DatabaseConnection,
    tenant_id: Uuid,
    user_id: Uuid,
) -> Result<()> {
    team_member::Entity::update_many()
        .col_expr(team_member::Column::IsActive, Expr::value(false))
        .filter(team_member::Column::TenantId.eq(tenant_id))
        .filter(team_member::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn add_stage(
    db: &DatabaseConnection,
    tenant_id: Uuid,
    slug: &str,
    is_won: bool,
    is_lost: bool,
) -> Result<()> {
    pipeline_stage::ActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(tenant_id),
        slug: Set(slug.to_string()),
        name: Set(slug.to_string()),
        is_won: Set(is_won),
        is_lost: Set(is_lost),
        sort_order: Set(0),
    }
    .insert(db)
    .await?;
    Ok(())
}

/// A lead with no optional fields; adjust it through `customize`.
pub async fn add_lead(
    db: &DatabaseConnection,
    tenant_id: Uuid,
    assigned_to: Option<Uuid>,
    customize: impl FnOnce(&mut crm_lead::ActiveModel),
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let mut lead = crm_lead::ActiveModel {
        id: Set(id),
        tenant_id: Set(tenant_id),
        assigned_to: Set(assigned_to),
        name: Set(Some("Lead".to_string())),
        phone: Set(None),
        email: Set(None),
        company: Set(None),
        region: Set(None),
        source: Set(None),
        status: Set("new".to_string()),
        estimated_value: Set(0.0),
        lost_reason: Set(None),
        activities_count: Set(0),
        first_response_at: Set(None),
        last_contacted_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    customize(&mut lead);
    lead.insert(db).await?;
    Ok(id)
}

pub async fn add_completed_task(
    db: &DatabaseConnection,
    tenant_id: Uuid,
    user_id: Uuid,
    lead_id: Option<Uuid>,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    crm_task::ActiveModel {
        id: Set(id),
        tenant_id: Set(tenant_id),
        assigned_to: Set(Some(user_id)),
        lead_id: Set(lead_id),
        kind: Set("call".to_string()),
        status: Set("completed".to_string()),
        due_at: Set(Some(now)),
        completed_at: Set(Some(now)),
        created_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(id)
}

/// An open task due at `due_at`.
pub async fn add_open_task(
    db: &DatabaseConnection,
    tenant_id: Uuid,
    user_id: Uuid,
    due_at: DateTime<Utc>,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    crm_task::ActiveModel {
        id: Set(id),
        tenant_id: Set(tenant_id),
        assigned_to: Set(Some(user_id)),
        lead_id: Set(None),
        kind: Set("call".to_string()),
        status: Set("pending".to_string()),
        due_at: Set(Some(due_at)),
        completed_at: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;
    Ok(id)
}
