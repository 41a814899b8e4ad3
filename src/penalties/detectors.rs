//! Violation detectors behind the auto penalty rules.
//!
//! Each rule's `trigger_event` selects a detector; its `conditions` object
//! tunes the thresholds. Detection itself is a pure function of the facts.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::activity::{ActivitySource, LeadFilter, OutcomeStages, TaskFilter};
use crate::error::EngineError;
use crate::kpi::metrics::{REQUIRED_LEAD_FIELDS, lead_field_filled};
use crate::models::penalty_rule::Model as RuleModel;
use crate::models::{crm_lead, crm_task, team_member};
use crate::period::TimeWindow;
use crate::repositories::penalty::RelatedEntity;

/// One detected violation, attributed to a user.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub user_id: Uuid,
    pub related: Option<RelatedEntity>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Detector {
    LeadNotContacted { hours: i64 },
    CrmNotFilled { required_fields: Vec<String>, grace_hours: i64 },
    TaskOverdue { overdue_days: i64 },
    NoActivity { hours: i64 },
}

impl Detector {
    /// Detector for a rule's trigger event; `None` for unknown events.
    pub fn for_rule(rule: &RuleModel) -> Option<Detector> {
        Some(match rule.trigger_event.as_str() {
            "lead_not_contacted_24h" => Detector::LeadNotContacted {
                hours: rule.condition_i64("hours", 24),
            },
            "lead_not_contacted_48h" => Detector::LeadNotContacted {
                hours: rule.condition_i64("hours", 48),
            },
            "crm_not_filled" => {
                let mut required_fields = rule.condition_strings("required_fields");
                if required_fields.is_empty() {
                    required_fields = REQUIRED_LEAD_FIELDS.iter().map(|f| f.to_string()).collect();
                }
                Detector::CrmNotFilled {
                    required_fields,
                    grace_hours: rule.condition_i64("grace_hours", 24),
                }
            }
            "task_overdue" => Detector::TaskOverdue {
                overdue_days: rule.condition_i64("overdue_days", 0),
            },
            "task_overdue_3_days" => Detector::TaskOverdue {
                overdue_days: rule.condition_i64("overdue_days", 3),
            },
            "no_activity_24h" => Detector::NoActivity {
                hours: rule.condition_i64("hours", 24),
            },
            _ => return None,
        })
    }

    /// Load the facts this detector needs and find its violations.
    pub async fn detect(
        &self,
        activity: &dyn ActivitySource,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Violation>, EngineError> {
        match self {
            Detector::LeadNotContacted { hours } => {
                let stages = activity.outcome_stages(tenant_id).await?;
                let leads = activity
                    .leads(
                        tenant_id,
                        &LeadFilter {
                            assigned_only: true,
                            never_contacted: true,
                            created_before: Some(now - Duration::hours(*hours)),
                            ..Default::default()
                        },
                    )
                    .await?;
                Ok(leads_not_contacted(&leads, &stages, *hours, now))
            }
            Detector::CrmNotFilled {
                required_fields,
                grace_hours,
            } => {
                let leads = activity
                    .leads(
                        tenant_id,
                        &LeadFilter {
                            assigned_only: true,
                            created_before: Some(now - Duration::hours(*grace_hours)),
                            ..Default::default()
                        },
                    )
                    .await?;
                Ok(crm_not_filled(&leads, required_fields, *grace_hours, now))
            }
            Detector::TaskOverdue { overdue_days } => {
                let tasks = activity
                    .tasks(
                        tenant_id,
                        &TaskFilter {
                            assigned_only: true,
                            open_due_before: Some(now - Duration::days(*overdue_days)),
                            ..Default::default()
                        },
                    )
                    .await?;
                Ok(tasks_overdue(&tasks, *overdue_days, now))
            }
            Detector::NoActivity { hours } => {
                let window = TimeWindow::trailing_hours(now, *hours);
                let team = activity.sales_team(tenant_id).await?;
                let mut active_users = HashSet::new();
                for member in &team {
                    if !activity
                        .calls(tenant_id, member.user_id, Some(window))
                        .await?
                        .is_empty()
                    {
                        active_users.insert(member.user_id);
                    }
                }
                let completed = activity
                    .tasks(
                        tenant_id,
                        &TaskFilter {
                            assigned_only: true,
                            completed_in: Some(window),
                            ..Default::default()
                        },
                    )
                    .await?;
                active_users.extend(completed.iter().filter_map(|t| t.assigned_to));
                let touched = activity
                    .leads(
                        tenant_id,
                        &LeadFilter {
                            assigned_only: true,
                            updated_in: Some(window),
                            ..Default::default()
                        },
                    )
                    .await?;
                active_users.extend(touched.iter().filter_map(|l| l.assigned_to));
                Ok(inactive_members(&team, &active_users, *hours))
            }
        }
    }
}

/// Open, assigned leads older than `hours` that nobody has contacted.
pub fn leads_not_contacted(
    leads: &[crm_lead::Model],
    stages: &OutcomeStages,
    hours: i64,
    now: DateTime<Utc>,
) -> Vec<Violation> {
    let cutoff = now - Duration::hours(hours);
    leads
        .iter()
        .filter(|lead| lead.created_at < cutoff)
        .filter(|lead| lead.last_contacted_at.is_none() && lead.activities_count == 0)
        .filter(|lead| !stages.is_closed(&lead.status))
        .filter_map(|lead| {
            lead.assigned_to.map(|user_id| Violation {
                user_id,
                related: Some(RelatedEntity::new("lead", lead.id)),
                description: format!(
                    "Lead {} ({}) not contacted within {hours} hours",
                    lead.id,
                    lead.name.as_deref().unwrap_or("unnamed")
                ),
            })
        })
        .collect()
}

/// Assigned leads past the grace period with required fields left blank.
pub fn crm_not_filled(
    leads: &[crm_lead::Model],
    required_fields: &[String],
    grace_hours: i64,
    now: DateTime<Utc>,
) -> Vec<Violation> {
    let cutoff = now - Duration::hours(grace_hours);
    leads
        .iter()
        .filter(|lead| lead.created_at < cutoff)
        .filter_map(|lead| {
            let missing: Vec<&str> = required_fields
                .iter()
                .map(String::as_str)
                .filter(|field| !lead_field_filled(lead, field))
                .collect();
            if missing.is_empty() {
                return None;
            }
            lead.assigned_to.map(|user_id| Violation {
                user_id,
                related: Some(RelatedEntity::new("lead", lead.id)),
                description: format!(
                    "Lead {} has incomplete CRM data, missing: {}",
                    lead.id,
                    missing.join(", ")
                ),
            })
        })
        .collect()
}

/// Open, assigned tasks more than `overdue_days` past their due time.
pub fn tasks_overdue(
    tasks: &[crm_task::Model],
    overdue_days: i64,
    now: DateTime<Utc>,
) -> Vec<Violation> {
    let cutoff = now - Duration::days(overdue_days);
    tasks
        .iter()
        .filter(|task| !task.is_completed() && task.status != "cancelled")
        .filter_map(|task| {
            let due = task.due_at.filter(|due| *due < cutoff)?;
            let user_id = task.assigned_to?;
            Some(Violation {
                user_id,
                related: Some(RelatedEntity::new("task", task.id)),
                description: format!(
                    "Task {} ({}) overdue by {} days",
                    task.id,
                    task.kind,
                    (now - due).num_days()
                ),
            })
        })
        .collect()
}

/// Team members with no call, completed task or lead update in the window.
pub fn inactive_members(
    team: &[team_member::Model],
    active_users: &HashSet<Uuid>,
    hours: i64,
) -> Vec<Violation> {
    team.iter()
        .filter(|member| member.is_active && !active_users.contains(&member.user_id))
        .map(|member| Violation {
            user_id: member.user_id,
            related: Some(RelatedEntity::new("user", member.user_id)),
            description: format!("No activity recorded in the last {hours} hours"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::penalty_rule::RuleTriggerType;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn lead(hours_old: i64) -> crm_lead::Model {
        let created = now() - Duration::hours(hours_old);
        crm_lead::Model {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            assigned_to: Some(Uuid::new_v4()),
            name: Some("Acme".to_string()),
            phone: Some("+1".to_string()),
            email: None,
            company: None,
            region: Some("north".to_string()),
            source: Some("web".to_string()),
            status: "new".to_string(),
            estimated_value: 0.0,
            lost_reason: None,
            activities_count: 0,
            first_response_at: None,
            last_contacted_at: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn task(days_overdue: i64, status: &str) -> crm_task::Model {
        let due = now() - Duration::days(days_overdue) - Duration::hours(1);
        crm_task::Model {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            assigned_to: Some(Uuid::new_v4()),
            lead_id: None,
            kind: "call".to_string(),
            status: status.to_string(),
            due_at: Some(due),
            completed_at: None,
            created_at: due - Duration::days(1),
        }
    }

    fn rule(trigger_event: &str, conditions: Option<serde_json::Value>) -> RuleModel {
        RuleModel {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            code: trigger_event.to_string(),
            name: trigger_event.to_string(),
            category: "discipline".to_string(),
            trigger_event: trigger_event.to_string(),
            trigger_type: RuleTriggerType::Auto,
            conditions,
            penalty_type: "fixed".to_string(),
            penalty_amount: 50_000.0,
            warning_threshold: 2,
            warning_validity_days: 30,
            daily_limit: None,
            monthly_limit: None,
            is_active: true,
        }
    }

    #[test]
    fn test_detector_defaults_and_overrides() {
        assert_eq!(
            Detector::for_rule(&rule("lead_not_contacted_48h", None)),
            Some(Detector::LeadNotContacted { hours: 48 })
        );
        assert_eq!(
            Detector::for_rule(&rule("lead_not_contacted_24h", Some(json!({"hours": 12})))),
            Some(Detector::LeadNotContacted { hours: 12 })
        );
        assert_eq!(
            Detector::for_rule(&rule("task_overdue_3_days", None)),
            Some(Detector::TaskOverdue { overdue_days: 3 })
        );
        match Detector::for_rule(&rule("crm_not_filled", None)) {
            Some(Detector::CrmNotFilled {
                required_fields,
                grace_hours,
            }) => {
                assert_eq!(required_fields.len(), 4);
                assert_eq!(grace_hours, 24);
            }
            other => panic!("unexpected detector {other:?}"),
        }
        assert_eq!(Detector::for_rule(&rule("late_lunch", None)), None);
    }

    #[test]
    fn test_uncontacted_leads_skip_fresh_contacted_and_closed() {
        let stages = OutcomeStages {
            won: Some("won".to_string()),
            lost: Some("lost".to_string()),
        };
        let stale = lead(30);
        let fresh = lead(2);
        let mut contacted = lead(30);
        contacted.last_contacted_at = Some(now());
        let mut closed = lead(30);
        closed.status = "won".to_string();

        let violations =
            leads_not_contacted(&[stale.clone(), fresh, contacted, closed], &stages, 24, now());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].related, Some(RelatedEntity::new("lead", stale.id)));
    }

    #[test]
    fn test_crm_not_filled_lists_missing_fields() {
        let mut incomplete = lead(48);
        incomplete.region = None;
        incomplete.phone = Some("  ".to_string());
        let complete = lead(48);
        let required: Vec<String> = REQUIRED_LEAD_FIELDS.iter().map(|f| f.to_string()).collect();

        let violations = crm_not_filled(&[incomplete, complete], &required, 24, now());
        assert_eq!(violations.len(), 1);
        assert!(violations[0].description.ends_with("missing: phone, region"));
    }

    #[test]
    fn test_overdue_tasks_respect_days_and_status() {
        let late = task(4, "pending");
        let slightly_late = task(1, "pending");
        let done = task(5, "completed");
        let violations = tasks_overdue(&[late.clone(), slightly_late, done], 3, now());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].user_id, late.assigned_to.unwrap());
    }

    #[test]
    fn test_inactive_members() {
        let member = |active: bool| team_member::Model {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            user_id: Uuid::new_v4(),
            display_name: None,
            role: "sales_operator".to_string(),
            is_active: active,
            joined_at: now(),
        };
        let busy = member(true);
        let idle = member(true);
        let gone = member(false);
        let active: HashSet<Uuid> = [busy.user_id].into_iter().collect();

        let violations = inactive_members(&[busy, idle.clone(), gone], &active, 24);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].related, Some(RelatedEntity::new("user", idle.user_id)));
    }
}
