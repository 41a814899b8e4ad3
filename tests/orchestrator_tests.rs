//! Event fan-out: reaction isolation, alert routing and follow-up events.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use performance_engine::config::EngineConfig;
use performance_engine::engine::PerformanceEngine;
use performance_engine::orchestrator::{DomainEvent, Reaction};
use performance_engine::repositories::{AlertRepository, SnapshotRepository};
use sea_orm::Set;
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{FailingSink, add_lead, add_member, add_stage, engine_with_sink, setup_engine};

async fn revenue_today(engine: &PerformanceEngine, tenant_id: Uuid, user: Uuid) -> Result<f64> {
    let metric = engine
        .catalog()
        .metric_by_type(tenant_id, "revenue")
        .await?
        .expect("revenue is seeded");
    let snapshot = SnapshotRepository::new(engine.db(), tenant_id)
        .find_daily(user, metric.id, Utc::now().date_naive())
        .await?;
    Ok(snapshot.map(|s| s.actual_value).unwrap_or_default())
}

#[tokio::test]
async fn failing_alert_does_not_undo_kpi_increment() -> Result<()> {
    let t = setup_engine().await?;
    let engine = engine_with_sink(&t.db, EngineConfig::default(), Arc::new(FailingSink));
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    let lead = add_lead(&t.db, t.tenant_id, Some(user), |_| {}).await?;

    let report = engine
        .dispatch(
            t.tenant_id,
            DomainEvent::DealClosed {
                lead_id: lead,
                user_id: Some(user),
                amount: 60_000_000.0,
            },
        )
        .await;

    let outcome = |reaction: Reaction| {
        report
            .outcomes
            .iter()
            .find(|o| o.event == "deal_closed" && o.reaction == reaction)
            .cloned()
            .expect("reaction ran")
    };
    assert!(outcome(Reaction::IncrementDealKpis).error.is_none());
    assert!(outcome(Reaction::RefreshLeaderboard).error.is_none());
    assert!(outcome(Reaction::AlertTeamOfDeal).error.is_some());
    assert!(report.failed().all(|o| o.reaction.as_str().starts_with("alert")));

    assert_eq!(revenue_today(&engine, t.tenant_id, user).await?, 60_000_000.0);
    Ok(())
}

#[tokio::test]
async fn hot_lead_alerts_head_and_assignee() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;

    let report = t
        .engine
        .dispatch(
            t.tenant_id,
            DomainEvent::LeadScoreUpdated {
                lead_id: Uuid::new_v4(),
                assigned_to: Some(user),
                old_score: 70,
                new_score: 85,
            },
        )
        .await;
    assert_eq!(report.failed().count(), 0);

    let head = t.alerts.of_type("hot_lead_for_head");
    assert_eq!(head.len(), 1);
    assert_eq!(head[0].user_id, None);
    let assignee = t.alerts.of_type("hot_lead");
    assert_eq!(assignee.len(), 1);
    assert_eq!(assignee[0].user_id, Some(user));

    // Already hot: no new crossing.
    t.engine
        .dispatch(
            t.tenant_id,
            DomainEvent::LeadScoreUpdated {
                lead_id: Uuid::new_v4(),
                assigned_to: Some(user),
                old_score: 85,
                new_score: 90,
            },
        )
        .await;
    assert_eq!(t.alerts.of_type("hot_lead").len(), 1);
    Ok(())
}

#[tokio::test]
async fn cooling_lead_alerts_the_assignee() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    t.engine
        .dispatch(
            t.tenant_id,
            DomainEvent::LeadScoreUpdated {
                lead_id: Uuid::new_v4(),
                assigned_to: Some(user),
                old_score: 45,
                new_score: 15,
            },
        )
        .await;
    let cold = t.alerts.of_type("lead_cold");
    assert_eq!(cold.len(), 1);
    assert_eq!(cold[0].data["category"], "frozen");
    Ok(())
}

#[tokio::test]
async fn won_stage_raises_deal_closed() -> Result<()> {
    let t = setup_engine().await?;
    add_stage(&t.db, t.tenant_id, "won", true, false).await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    let lead = add_lead(&t.db, t.tenant_id, Some(user), |lead| {
        lead.status = Set("won".to_string());
        lead.estimated_value = Set(20_000_000.0);
        lead.phone = Set(Some("+15550100".to_string()));
    })
    .await?;

    let report = t
        .engine
        .dispatch(
            t.tenant_id,
            DomainEvent::LeadStageChanged {
                lead_id: lead,
                assigned_to: Some(user),
                new_status: "won".to_string(),
            },
        )
        .await;

    assert_eq!(report.events[0], "lead_stage_changed");
    assert!(report.events.contains(&"deal_closed"));
    assert_eq!(report.failed().count(), 0);
    assert_eq!(t.alerts.of_type("deal_closed").len(), 1);
    assert_eq!(revenue_today(&t.engine, t.tenant_id, user).await?, 20_000_000.0);

    // The closed deal is the user's first.
    let achievements = t.alerts.of_type("achievement");
    assert!(achievements.iter().any(|a| a.data["code"] == "first_sale"));
    Ok(())
}

#[tokio::test]
async fn penalty_alert_lands_in_the_outbox() -> Result<()> {
    let t = setup_engine().await?;
    let engine = PerformanceEngine::new(t.db.clone(), EngineConfig::default());
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;

    let report = engine
        .dispatch(
            t.tenant_id,
            DomainEvent::PenaltyApplied {
                user_id: user,
                penalty_id: Uuid::new_v4(),
                reason: "Task overdue".to_string(),
                amount: 30_000.0,
            },
        )
        .await;
    assert_eq!(report.failed().count(), 0);

    let stored = AlertRepository::new(&t.db, t.tenant_id)
        .list_by_type("penalty_applied")
        .await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].user_id, Some(user));
    Ok(())
}
