//! Periodic reminders raised on every scheduler tick.
//!
//! Each check looks at the current state of the tenant and sends an alert
//! for every subject (lead, member, warning, streak) that needs one, asking
//! the sink first whether the same reminder already went out recently. A
//! tick that runs twice therefore sends nothing new.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::{Alert, AlertSink};
use crate::achievements::StreakState;
use crate::activity::{ActivitySource, LeadFilter, TaskFilter};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::leaderboard::RankMove;
use crate::models::penalty_warning::Model as WarningModel;
use crate::models::sales_alert::{AlertPriority, AlertStatus};
use crate::period::{DateRange, PeriodType, TimeWindow, start_of_day};
use crate::repositories::{AchievementRepository, AlertRepository, PenaltyRepository, SnapshotRepository};

/// Alerts sent by one round of checks. A failed check sends nothing and is
/// listed in `failed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertChecksReport {
    pub lead_followups: usize,
    pub kpi_warnings: usize,
    pub penalty_warnings: usize,
    pub streak_warnings: usize,
    pub failed: Vec<&'static str>,
}

impl AlertChecksReport {
    pub fn sent(&self) -> usize {
        self.lead_followups + self.kpi_warnings + self.penalty_warnings + self.streak_warnings
    }
}

#[derive(Clone)]
pub struct AlertMonitor {
    db: DatabaseConnection,
    activity: Arc<dyn ActivitySource>,
    sink: Arc<dyn AlertSink>,
    config: EngineConfig,
}

impl AlertMonitor {
    pub fn new(
        db: DatabaseConnection,
        activity: Arc<dyn ActivitySource>,
        sink: Arc<dyn AlertSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            activity,
            sink,
            config,
        }
    }

    /// Run every periodic check. Each one is its own failure boundary.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn run_checks(&self, tenant_id: Uuid, now: DateTime<Utc>) -> AlertChecksReport {
        let mut report = AlertChecksReport::default();
        report.lead_followups = self
            .guard("lead_followup", &mut report.failed, self.check_lead_followups(tenant_id, now))
            .await;
        report.kpi_warnings = self
            .guard("kpi_warning", &mut report.failed, self.check_kpi_warnings(tenant_id, now))
            .await;
        report.penalty_warnings = self
            .guard(
                "penalty_warning",
                &mut report.failed,
                self.check_penalty_warnings(tenant_id, now),
            )
            .await;
        report.streak_warnings = self
            .guard(
                "streak_warning",
                &mut report.failed,
                self.check_streak_warnings(tenant_id, now),
            )
            .await;

        if report.sent() > 0 || !report.failed.is_empty() {
            info!(
                tenant_id = %tenant_id,
                sent = report.sent(),
                failed = report.failed.len(),
                "Alert checks completed"
            );
        }
        report
    }

    async fn guard(
        &self,
        check: &'static str,
        failed: &mut Vec<&'static str>,
        run: impl std::future::Future<Output = Result<usize, EngineError>>,
    ) -> usize {
        match run.await {
            Ok(sent) => {
                counter!("alerts_checked_sent_total", "check" => check).increment(sent as u64);
                sent
            }
            Err(err) => {
                counter!("alert_check_failures_total", "check" => check).increment(1);
                error!(check, error = %err, "Alert check failed");
                failed.push(check);
                0
            }
        }
    }

    /// Remind assignees of uncontacted leads that are about to be penalised.
    pub async fn check_lead_followups(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<usize, EngineError> {
        let deadline = self.config.followup_penalty_hours;
        let notice = self.config.followup_warning_hours;
        let stages = self.activity.outcome_stages(tenant_id).await?;
        let leads = self
            .activity
            .leads(
                tenant_id,
                &LeadFilter {
                    assigned_only: true,
                    never_contacted: true,
                    created_in: Some(TimeWindow {
                        from: now - Duration::hours(deadline),
                        until: now - Duration::hours(deadline - notice),
                    }),
                    ..Default::default()
                },
            )
            .await?;

        let mut sent = 0;
        for lead in leads {
            let Some(user_id) = lead.assigned_to else {
                continue;
            };
            if stages.is_closed(&lead.status)
                || self
                    .sink
                    .sent_since(tenant_id, "lead_followup", lead.id, now - Duration::hours(notice))
                    .await?
            {
                continue;
            }

            let hours_remaining = deadline - (now - lead.created_at).num_hours();
            let name = lead.name.unwrap_or_default();
            let priority = if hours_remaining <= 2 {
                AlertPriority::Urgent
            } else {
                AlertPriority::High
            };
            self.sink
                .send(
                    tenant_id,
                    Alert::new(
                        "lead_followup",
                        "Lead waiting for contact",
                        format!("Contact {name} within {hours_remaining} h to avoid a penalty"),
                    )
                    .to(user_id)
                    .priority(priority)
                    .about(lead.id)
                    .data(json!({
                        "lead_id": lead.id,
                        "lead_name": name,
                        "hours_remaining": hours_remaining,
                    })),
                )
                .await?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Tell the heads about members whose recent average achievement is low.
    /// Members without snapshots in the window are skipped.
    pub async fn check_kpi_warnings(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<usize, EngineError> {
        let days = self.config.kpi_warning_days;
        let today = now.date_naive();
        let range = DateRange::new(today - Duration::days(days), today);
        let snapshots = SnapshotRepository::new(&self.db, tenant_id);

        let mut sent = 0;
        for member in self.activity.sales_team(tenant_id).await? {
            let recent = snapshots.daily_in_range(member.user_id, range).await?;
            if recent.is_empty() {
                continue;
            }
            let average = recent.iter().map(|s| s.achievement_percent).sum::<f64>()
                / recent.len() as f64;
            let average = (average * 10.0).round() / 10.0;
            if average >= self.config.kpi_warning_threshold
                || self
                    .sink
                    .sent_since(tenant_id, "kpi_warning", member.user_id, now - Duration::days(1))
                    .await?
            {
                continue;
            }

            let name = member.display_name.clone().unwrap_or_default();
            let priority = if average < 30.0 {
                AlertPriority::Urgent
            } else {
                AlertPriority::High
            };
            self.sink
                .send(
                    tenant_id,
                    Alert::new(
                        "kpi_warning",
                        "Low KPI",
                        format!("{name}: {average}% of target over {days} days"),
                    )
                    .priority(priority)
                    .about(member.user_id)
                    .data(json!({
                        "operator_id": member.user_id,
                        "operator_name": name,
                        "kpi_score": average,
                        "days": days,
                    })),
                )
                .await?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Warn users whose valid warnings for a rule have reached its threshold:
    /// their next violation of that rule is charged.
    pub async fn check_penalty_warnings(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<usize, EngineError> {
        let repo = PenaltyRepository::new(&self.db, tenant_id);
        let mut held: HashMap<(Uuid, Uuid), Vec<WarningModel>> = HashMap::new();
        for warning in repo.valid_warnings(now).await? {
            held.entry((warning.user_id, warning.rule_id))
                .or_default()
                .push(warning);
        }

        let mut sent = 0;
        for ((user_id, rule_id), warnings) in held {
            let Some(rule) = repo.find_rule(rule_id).await?.filter(|r| r.is_active) else {
                continue;
            };
            if rule.warning_threshold <= 0 || warnings.len() < rule.warning_threshold as usize {
                continue;
            }
            // Newest first
            let Some(latest) = warnings.first() else {
                continue;
            };
            if self
                .sink
                .sent_since(tenant_id, "penalty_warning", latest.id, latest.created_at)
                .await?
            {
                continue;
            }

            self.sink
                .send(
                    tenant_id,
                    Alert::new(
                        "penalty_warning",
                        "Next violation will be charged",
                        format!(
                            "{} warnings for '{}'. The next one costs {:.0}",
                            warnings.len(),
                            rule.name,
                            rule.penalty_amount
                        ),
                    )
                    .to(user_id)
                    .priority(AlertPriority::Urgent)
                    .about(latest.id)
                    .data(json!({
                        "warning_id": latest.id,
                        "rule_code": rule.code,
                        "warnings": warnings.len(),
                        "penalty_amount": rule.penalty_amount,
                        "expires_at": latest.expires_at,
                    })),
                )
                .await?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Remind members whose streak breaks unless today counts.
    pub async fn check_streak_warnings(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<usize, EngineError> {
        let today = now.date_naive();
        let since = start_of_day(today);
        let repo = AchievementRepository::new(&self.db, tenant_id);

        let mut sent = 0;
        for member in self.activity.sales_team(tenant_id).await? {
            for streak in repo.list_streaks(member.user_id).await? {
                if streak.current_streak < self.config.streak_warning_min_days
                    || !StreakState::from(&streak).at_risk(today)
                    || self
                        .sink
                        .sent_since(tenant_id, "streak_warning", streak.id, since)
                        .await?
                {
                    continue;
                }

                let priority = if streak.current_streak >= 7 {
                    AlertPriority::High
                } else {
                    AlertPriority::Medium
                };
                self.sink
                    .send(
                        tenant_id,
                        Alert::new(
                            "streak_warning",
                            format!("{}-day streak at risk", streak.current_streak),
                            format!("Keep your {} streak going today", streak.streak_type),
                        )
                        .to(member.user_id)
                        .priority(priority)
                        .about(streak.id)
                        .data(json!({
                            "streak_type": streak.streak_type,
                            "current_streak": streak.current_streak,
                        })),
                    )
                    .await?;
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Morning plan for every member: open tasks due today and leads from
    /// the last day nobody has contacted. Sent once per member and day.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn send_daily_summary(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<usize, EngineError> {
        let today = now.date_naive();
        let day = DateRange::day(today).window();

        let mut sent = 0;
        for member in self.activity.sales_team(tenant_id).await? {
            let user_id = member.user_id;
            if self
                .sink
                .sent_since(tenant_id, "daily_summary", user_id, day.from)
                .await?
            {
                continue;
            }

            let tasks: Vec<_> = self
                .activity
                .tasks(
                    tenant_id,
                    &TaskFilter {
                        assigned_to: Some(user_id),
                        open_due_before: Some(day.until),
                        ..Default::default()
                    },
                )
                .await?
                .into_iter()
                .filter(|task| task.due_at.is_some_and(|due| day.contains(due)))
                .collect();
            let leads = self
                .activity
                .leads(
                    tenant_id,
                    &LeadFilter {
                        assigned_to: Some(user_id),
                        never_contacted: true,
                        created_in: Some(TimeWindow::trailing_hours(now, 24)),
                        ..Default::default()
                    },
                )
                .await?;

            self.sink
                .send(
                    tenant_id,
                    Alert::new(
                        "daily_summary",
                        "Today's plan",
                        format!("Tasks: {}, follow-ups needed: {}", tasks.len(), leads.len()),
                    )
                    .to(user_id)
                    .priority(AlertPriority::Low)
                    .about(user_id)
                    .scheduled_at(day.from + Duration::hours(9))
                    .expires_at(day.from + Duration::hours(12))
                    .data(json!({
                        "tasks_count": tasks.len(),
                        "leads_count": leads.len(),
                        "tasks": tasks.iter().take(5).map(|t| json!({
                            "id": t.id,
                            "kind": t.kind,
                            "due_at": t.due_at,
                        })).collect::<Vec<_>>(),
                        "leads": leads.iter().take(5).map(|l| json!({
                            "id": l.id,
                            "name": l.name,
                        })).collect::<Vec<_>>(),
                    })),
                )
                .await?;
            sent += 1;
        }

        info!(tenant_id = %tenant_id, sent, "Daily summaries sent");
        Ok(sent)
    }

    /// Purge read, dismissed and actioned alerts past the retention period.
    pub async fn cleanup_expired_alerts(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, EngineError> {
        let cutoff = now - Duration::days(self.config.alert_retention_days);
        let removed = AlertRepository::new(&self.db, tenant_id)
            .delete_settled_before(cutoff)
            .await?;
        if removed > 0 {
            info!(tenant_id = %tenant_id, removed, "Old alerts purged");
        }
        Ok(removed)
    }

    /// Mark an outbox alert read, dismissed or actioned.
    pub async fn set_status(
        &self,
        tenant_id: Uuid,
        alert_id: Uuid,
        status: AlertStatus,
    ) -> Result<(), EngineError> {
        if !AlertRepository::new(&self.db, tenant_id)
            .set_status(alert_id, status)
            .await?
        {
            return Err(EngineError::not_found("alert", alert_id));
        }
        Ok(())
    }
}

/// Alert for a rank move of at least `min_change` places, `None` otherwise.
pub fn rank_change_alert(period_type: PeriodType, rank_move: &RankMove, min_change: i32) -> Option<Alert> {
    let change = rank_move.change();
    if change.abs() < min_change {
        return None;
    }
    let (title, priority) = if change > 0 {
        ("You climbed the leaderboard", AlertPriority::Medium)
    } else {
        ("You dropped on the leaderboard", AlertPriority::Low)
    };
    Some(
        Alert::new(
            "leaderboard_change",
            title,
            format!("From #{} to #{} on the {period_type} board", rank_move.from, rank_move.to),
        )
        .to(rank_move.user_id)
        .priority(priority)
        .data(json!({
            "period_type": period_type,
            "old_position": rank_move.from,
            "new_position": rank_move.to,
            "change": change,
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rank_move(from: i32, to: i32) -> RankMove {
        RankMove {
            user_id: Uuid::new_v4(),
            from,
            to,
        }
    }

    #[test]
    fn test_small_moves_are_quiet() {
        assert!(rank_change_alert(PeriodType::Daily, &rank_move(5, 3), 3).is_none());
        assert!(rank_change_alert(PeriodType::Daily, &rank_move(3, 5), 3).is_none());
    }

    #[test]
    fn test_climb_outranks_drop() {
        let up = rank_change_alert(PeriodType::Daily, &rank_move(8, 2), 3).expect("moved 6 up");
        assert_eq!(up.priority, AlertPriority::Medium);
        assert_eq!(up.data["change"], 6);

        let down = rank_change_alert(PeriodType::Daily, &rank_move(2, 6), 3).expect("moved 4 down");
        assert_eq!(down.priority, AlertPriority::Low);
        assert_eq!(down.data["change"], -4);
    }
}
