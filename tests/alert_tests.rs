//! Periodic reminders, their dedup and the outbox cleanup.

use anyhow::Result;
use chrono::{Duration, Utc};
use performance_engine::alerts::checks::AlertChecksReport;
use performance_engine::config::EngineConfig;
use performance_engine::engine::PerformanceEngine;
use performance_engine::leaderboard::RankMove;
use performance_engine::models::sales_alert::{self, AlertPriority, AlertStatus};
use performance_engine::models::user_streak;
use performance_engine::orchestrator::DomainEvent;
use performance_engine::penalties::Violation;
use performance_engine::period::{PeriodType, start_of_day};
use performance_engine::repositories::penalty::RelatedEntity;
use performance_engine::repositories::{AlertRepository, PenaltyRepository};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{add_lead, add_member, add_open_task, setup_engine, setup_engine_with, setup_test_db};

#[tokio::test]
async fn uncontacted_leads_get_one_reminder_before_the_deadline() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    let now = Utc::now();
    for hours_ago in [21, 23, 2] {
        add_lead(&t.db, t.tenant_id, Some(user), |lead| {
            lead.created_at = Set(now - Duration::hours(hours_ago));
        })
        .await?;
    }
    // Already contacted
    add_lead(&t.db, t.tenant_id, Some(user), |lead| {
        lead.created_at = Set(now - Duration::hours(22));
        lead.last_contacted_at = Set(Some(now - Duration::hours(1)));
    })
    .await?;

    let monitor = t.engine.alert_monitor();
    assert_eq!(monitor.check_lead_followups(t.tenant_id, now).await?, 2);

    let reminders = t.alerts.of_type("lead_followup");
    assert!(reminders.iter().all(|a| a.user_id == Some(user)));
    let with = |priority| reminders.iter().filter(|a| a.priority == priority).count();
    assert_eq!(with(AlertPriority::High), 1);
    assert_eq!(with(AlertPriority::Urgent), 1);

    assert_eq!(monitor.check_lead_followups(t.tenant_id, now).await?, 0);
    Ok(())
}

#[tokio::test]
async fn low_average_achievement_warns_the_heads() -> Result<()> {
    let t = setup_engine().await?;
    let slow = add_member(&t.db, t.tenant_id, "Slow").await?;
    let fast = add_member(&t.db, t.tenant_id, "Fast").await?;
    add_member(&t.db, t.tenant_id, "New").await?;
    let kpi = t.engine.kpi();
    kpi.increment_kpi(t.tenant_id, slow, "revenue", 1.0).await?;
    kpi.increment_kpi(t.tenant_id, fast, "revenue", 1e15).await?;

    let monitor = t.engine.alert_monitor();
    let now = Utc::now();
    assert_eq!(monitor.check_kpi_warnings(t.tenant_id, now).await?, 1);

    let warning = &t.alerts.of_type("kpi_warning")[0];
    assert_eq!(warning.user_id, None);
    assert_eq!(warning.subject_id, Some(slow));
    assert_eq!(warning.priority, AlertPriority::Urgent);
    assert_eq!(warning.data["operator_name"], "Slow");

    assert_eq!(monitor.check_kpi_warnings(t.tenant_id, now).await?, 0);
    Ok(())
}

#[tokio::test]
async fn reaching_the_warning_threshold_announces_the_next_charge() -> Result<()> {
    let t = setup_engine_with(EngineConfig {
        default_warning_threshold: 2,
        ..Default::default()
    })
    .await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    let rule = PenaltyRepository::new(&t.db, t.tenant_id)
        .find_rule_by_code("task_overdue")
        .await?
        .expect("default rule seeded");
    let violation = || Violation {
        user_id: user,
        related: Some(RelatedEntity::new("task", Uuid::new_v4())),
        description: "task overdue".to_string(),
    };
    let monitor = t.engine.alert_monitor();
    let now = Utc::now();

    t.engine
        .penalties()
        .issue_for_violation(t.tenant_id, &rule, &violation(), now)
        .await?;
    assert_eq!(monitor.check_penalty_warnings(t.tenant_id, now).await?, 0);

    t.engine
        .penalties()
        .issue_for_violation(t.tenant_id, &rule, &violation(), now)
        .await?;
    assert_eq!(monitor.check_penalty_warnings(t.tenant_id, now).await?, 1);
    assert_eq!(monitor.check_penalty_warnings(t.tenant_id, now).await?, 0);

    let alert = &t.alerts.of_type("penalty_warning")[0];
    assert_eq!(alert.user_id, Some(user));
    assert_eq!(alert.priority, AlertPriority::Urgent);
    assert_eq!(alert.data["warnings"], 2);
    assert_eq!(alert.data["rule_code"], "task_overdue");
    Ok(())
}

#[tokio::test]
async fn streaks_that_break_tonight_are_flagged() -> Result<()> {
    let t = setup_engine().await?;
    let now = Utc::now();
    let today = now.date_naive();
    let streak = |user_id: Uuid, current: i32, last: chrono::NaiveDate| user_streak::ActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(t.tenant_id),
        user_id: Set(user_id),
        streak_type: Set("tasks".to_string()),
        current_streak: Set(current),
        best_streak: Set(current),
        last_qualifying_date: Set(Some(last)),
        started_on: Set(Some(last - Duration::days(current as i64 - 1))),
        updated_at: Set(now),
    };

    let at_risk = add_member(&t.db, t.tenant_id, "At risk").await?;
    let done_today = add_member(&t.db, t.tenant_id, "Done today").await?;
    let too_short = add_member(&t.db, t.tenant_id, "Too short").await?;
    streak(at_risk, 4, today - Duration::days(1)).insert(&t.db).await?;
    streak(done_today, 9, today).insert(&t.db).await?;
    streak(too_short, 2, today - Duration::days(1)).insert(&t.db).await?;

    let monitor = t.engine.alert_monitor();
    assert_eq!(monitor.check_streak_warnings(t.tenant_id, now).await?, 1);
    assert_eq!(monitor.check_streak_warnings(t.tenant_id, now).await?, 0);

    let alert = &t.alerts.of_type("streak_warning")[0];
    assert_eq!(alert.user_id, Some(at_risk));
    assert_eq!(alert.priority, AlertPriority::Medium);
    assert_eq!(alert.data["current_streak"], 4);
    Ok(())
}

#[tokio::test]
async fn daily_plan_lists_todays_work_once() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    let now = Utc::now();
    let day_start = start_of_day(now.date_naive());
    add_open_task(&t.db, t.tenant_id, user, day_start + Duration::minutes(1)).await?;
    add_open_task(&t.db, t.tenant_id, user, day_start + Duration::days(2)).await?;
    add_lead(&t.db, t.tenant_id, Some(user), |lead| {
        lead.created_at = Set(now - Duration::hours(1));
    })
    .await?;

    let monitor = t.engine.alert_monitor();
    assert_eq!(monitor.send_daily_summary(t.tenant_id, now).await?, 1);
    assert_eq!(monitor.send_daily_summary(t.tenant_id, now).await?, 0);

    let plan = &t.alerts.of_type("daily_summary")[0];
    assert_eq!(plan.user_id, Some(user));
    assert_eq!(plan.priority, AlertPriority::Low);
    assert_eq!(plan.data["tasks_count"], 1);
    assert_eq!(plan.data["leads_count"], 1);
    assert_eq!(plan.scheduled_at, Some(day_start + Duration::hours(9)));
    Ok(())
}

#[tokio::test]
async fn outbox_dedups_across_runs_and_purges_settled_alerts() -> Result<()> {
    let db = setup_test_db().await?;
    let engine = PerformanceEngine::new(db.clone(), EngineConfig::default());
    let (tenant, _) = engine.create_tenant("Acme Sales").await?;
    let user = add_member(&db, tenant.id, "Dana").await?;
    let now = Utc::now();
    add_lead(&db, tenant.id, Some(user), |lead| {
        lead.created_at = Set(now - Duration::hours(21));
    })
    .await?;

    let monitor = engine.alert_monitor();
    let first: AlertChecksReport = monitor.run_checks(tenant.id, now).await;
    assert_eq!(first.lead_followups, 1);
    assert!(first.failed.is_empty());
    assert_eq!(monitor.run_checks(tenant.id, now).await.lead_followups, 0);

    let repo = AlertRepository::new(&db, tenant.id);
    let queued = repo.list_by_type("lead_followup").await?;
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].status, AlertStatus::Unread);

    let old = |status: AlertStatus| sales_alert::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(Some(user)),
        alert_type: Set("deal_closed".to_string()),
        priority: Set(AlertPriority::Medium),
        title: Set("Deal closed".to_string()),
        message: Set("Acme".to_string()),
        data: Set(json!({})),
        channels: Set(json!(["app"])),
        status: Set(status),
        created_at: Set(now - Duration::days(45)),
        ..Default::default()
    };
    repo.insert(old(AlertStatus::Read)).await?;
    repo.insert(old(AlertStatus::Dismissed)).await?;
    repo.insert(old(AlertStatus::Unread)).await?;

    // The fresh reminder is read but still inside the retention period.
    monitor
        .set_status(tenant.id, queued[0].id, AlertStatus::Read)
        .await?;
    assert_eq!(monitor.cleanup_expired_alerts(tenant.id, now).await?, 2);
    assert_eq!(repo.list_by_type("deal_closed").await?.len(), 1);
    assert_eq!(repo.list_by_type("lead_followup").await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn large_rank_moves_are_announced() -> Result<()> {
    let t = setup_engine().await?;
    let climber = Uuid::new_v4();
    let faller = Uuid::new_v4();
    let nudged = Uuid::new_v4();

    let report = t
        .engine
        .dispatch(
            t.tenant_id,
            DomainEvent::LeaderboardUpdated {
                period_type: PeriodType::Weekly,
                period_start: Utc::now().date_naive(),
                moves: vec![
                    RankMove { user_id: climber, from: 9, to: 2 },
                    RankMove { user_id: faller, from: 1, to: 5 },
                    RankMove { user_id: nudged, from: 4, to: 3 },
                ],
            },
        )
        .await;
    assert_eq!(report.failed().count(), 0);

    let alerts = t.alerts.of_type("leaderboard_change");
    assert_eq!(alerts.len(), 2);
    let climbed = alerts.iter().find(|a| a.user_id == Some(climber)).expect("climber told");
    assert_eq!(climbed.priority, AlertPriority::Medium);
    assert_eq!(climbed.data["change"], 7);
    let fell = alerts.iter().find(|a| a.user_id == Some(faller)).expect("faller told");
    assert_eq!(fell.priority, AlertPriority::Low);
    assert!(alerts.iter().all(|a| a.user_id != Some(nudged)));
    Ok(())
}
