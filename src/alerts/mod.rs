//! # Alerts
//!
//! The engine only builds alerts; delivery belongs to whoever reads the
//! `sales_alerts` outbox. [`AlertSink`] is the seam: the default sink writes
//! the row, tests substitute a recording sink. [`checks`] holds the periodic
//! reminders the scheduler raises on every tick.

pub mod checks;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, Set};
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::sales_alert::{self, AlertPriority, AlertStatus};
use crate::repositories::AlertRepository;

pub const DEFAULT_CHANNEL: &str = "app";

/// An alert ready to be handed to a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    /// Recipient; `None` broadcasts to the tenant
    pub user_id: Option<Uuid>,
    pub alert_type: String,
    pub priority: AlertPriority,
    pub title: String,
    pub message: String,
    pub data: Value,
    pub channels: Vec<String>,
    /// Lead, warning, streak or member the alert is about
    pub subject_id: Option<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Medium priority, in-app only, broadcast until [`Alert::to`] narrows it.
    pub fn new(
        alert_type: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id: None,
            alert_type: alert_type.into(),
            priority: AlertPriority::default(),
            title: title.into(),
            message: message.into(),
            data: json!({}),
            channels: vec![DEFAULT_CHANNEL.to_string()],
            subject_id: None,
            scheduled_at: None,
            expires_at: None,
        }
    }

    pub fn to(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn priority(mut self, priority: AlertPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn channels(mut self, channels: &[&str]) -> Self {
        if !channels.is_empty() {
            self.channels = channels.iter().map(|c| c.to_string()).collect();
        }
        self
    }

    pub fn about(mut self, subject_id: Uuid) -> Self {
        self.subject_id = Some(subject_id);
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, tenant_id: Uuid, alert: Alert) -> Result<(), EngineError>;

    /// Whether an alert of `alert_type` about `subject_id` went out at or
    /// after `since`. Sinks that keep no history answer `false`.
    async fn sent_since(
        &self,
        _tenant_id: Uuid,
        _alert_type: &str,
        _subject_id: Uuid,
        _since: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        Ok(false)
    }
}

/// Writes alerts to the `sales_alerts` outbox.
#[derive(Clone)]
pub struct DbAlertSink {
    db: DatabaseConnection,
}

impl DbAlertSink {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AlertSink for DbAlertSink {
    async fn send(&self, tenant_id: Uuid, alert: Alert) -> Result<(), EngineError> {
        let row = AlertRepository::new(&self.db, tenant_id)
            .insert(sales_alert::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(alert.user_id),
                alert_type: Set(alert.alert_type),
                priority: Set(alert.priority),
                title: Set(alert.title),
                message: Set(alert.message),
                data: Set(alert.data),
                channels: Set(json!(alert.channels)),
                subject_id: Set(alert.subject_id),
                status: Set(AlertStatus::Unread),
                scheduled_at: Set(alert.scheduled_at),
                expires_at: Set(alert.expires_at),
                created_at: Set(Utc::now()),
                ..Default::default()
            })
            .await?;
        debug!(
            tenant_id = %tenant_id,
            alert_id = %row.id,
            alert_type = %row.alert_type,
            "Alert queued"
        );
        Ok(())
    }

    async fn sent_since(
        &self,
        tenant_id: Uuid,
        alert_type: &str,
        subject_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        Ok(AlertRepository::new(&self.db, tenant_id)
            .exists_since(alert_type, subject_id, since)
            .await?)
    }
}
