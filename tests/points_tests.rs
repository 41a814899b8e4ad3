//! Points ledger: achievement and action credits, medal settlement, levels,
//! and achievement conditions that read the ledger and the snapshot history.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use performance_engine::models::achievement_definition::{self, TriggerType};
use performance_engine::orchestrator::DomainEvent;
use performance_engine::period::PeriodType;
use performance_engine::points::PointsSource;
use performance_engine::repositories::AchievementRepository;
use performance_engine::scheduler::EngineScheduler;
use sea_orm::Set;
use serde_json::json;
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{TestEngine, add_lead, add_member, add_stage, setup_engine};

async fn define(t: &TestEngine, code: &str, conditions: serde_json::Value) -> Result<()> {
    AchievementRepository::new(&t.db, t.tenant_id)
        .create_definition(
            achievement_definition::ActiveModel {
                name: Set(code.to_string()),
                description: Set(None),
                category: Set("sales".to_string()),
                metric: Set("leads_converted".to_string()),
                trigger_type: Set(TriggerType::Cumulative),
                target_value: Set(1.0),
                conditions: Set(Some(conditions)),
                is_repeatable: Set(false),
                tier: Set("silver".to_string()),
                points: Set(20),
                is_active: Set(true),
                ..Default::default()
            },
            code,
        )
        .await?;
    Ok(())
}

async fn won_deal(t: &TestEngine, user: Uuid) -> Result<()> {
    add_stage(&t.db, t.tenant_id, "won", true, false).await?;
    add_lead(&t.db, t.tenant_id, Some(user), |lead| {
        lead.status = Set("won".to_string());
        lead.estimated_value = Set(10_000_000.0);
    })
    .await?;
    Ok(())
}

#[tokio::test]
async fn achievement_points_are_credited_once() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    let achievements = t.engine.achievements();
    let points = t.engine.points();

    let awarded = achievements
        .unlock(t.tenant_id, user, "first_sale")
        .await?
        .expect("first unlock");
    assert!(achievements.unlock(t.tenant_id, user, "first_sale").await?.is_none());

    let balance = points.balance(t.tenant_id, user).await?.expect("balance created");
    assert_eq!(balance.total_points, awarded.definition.points as i64);
    assert_eq!(balance.achievements_count, 1);

    let history = points.history(t.tenant_id, user, 10).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].source, "achievement");
    assert_eq!(history[0].source_key, "first_sale:1");
    assert_eq!(history[0].balance_after, balance.total_points);
    Ok(())
}

#[tokio::test]
async fn crossing_a_threshold_levels_up() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    let points = t.engine.points();
    let source = |key| PointsSource::Action {
        action: "meeting_held".to_string(),
        key,
    };

    let first = points
        .add_points(t.tenant_id, user, &source(Uuid::new_v4()), 60, None)
        .await?
        .expect("credited");
    assert!(!first.leveled_up);
    assert_eq!(first.balance.level, 1);

    let repeated_key = Uuid::new_v4();
    let second = points
        .add_points(t.tenant_id, user, &source(repeated_key), 60, None)
        .await?
        .expect("credited");
    assert!(second.leveled_up);
    assert_eq!(second.balance.level, 2);
    assert_eq!(second.balance.total_points, 120);

    // Same key again: nothing changes.
    assert!(points
        .add_points(t.tenant_id, user, &source(repeated_key), 60, None)
        .await?
        .is_none());
    let progress = points.progress(t.tenant_id, user).await?;
    assert_eq!(progress.total_points, 120);
    assert_eq!(progress.next_level_at, Some(300));
    Ok(())
}

#[tokio::test]
async fn replayed_task_event_pays_once() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    let event = DomainEvent::TaskCompleted {
        task_id: Uuid::new_v4(),
        user_id: Some(user),
        lead_id: None,
    };

    t.engine.dispatch(t.tenant_id, event.clone()).await;
    t.engine.dispatch(t.tenant_id, event).await;

    let balance = t
        .engine
        .points()
        .balance(t.tenant_id, user)
        .await?
        .expect("balance created");
    assert_eq!(balance.total_points, 15);
    Ok(())
}

#[tokio::test]
async fn closed_board_medals_settle_once() -> Result<()> {
    let t = setup_engine().await?;
    let mut users = Vec::new();
    for (name, revenue) in [("Ann", 80_000_000.0), ("Ben", 40_000_000.0), ("Cid", 20_000_000.0), ("Dee", 5_000_000.0)] {
        let user = add_member(&t.db, t.tenant_id, name).await?;
        t.engine
            .kpi()
            .increment_kpi(t.tenant_id, user, "revenue", revenue)
            .await?;
        users.push(user);
    }
    let scheduler = EngineScheduler::new(Arc::new(t.engine.clone()), Default::default());
    let today = Utc::now().date_naive();
    scheduler
        .run_period_summary(t.tenant_id, PeriodType::Weekly, today)
        .await?;
    scheduler
        .run_leaderboard_update(t.tenant_id, PeriodType::Weekly)
        .await?;

    let week_start = PeriodType::Weekly.bounds_for(today).start;
    let points = t.engine.points();
    assert_eq!(points.settle_medals(t.tenant_id, PeriodType::Weekly, week_start).await?, 3);
    assert_eq!(points.settle_medals(t.tenant_id, PeriodType::Weekly, week_start).await?, 0);
    assert_eq!(points.settle_medals(t.tenant_id, PeriodType::Daily, today).await?, 0);

    let ann = points.balance(t.tenant_id, users[0]).await?.expect("gold paid");
    assert_eq!(ann.total_points, 100);
    assert_eq!(ann.gold_medals, 1);
    assert_eq!(ann.best_rank, Some(1));
    let cid = points.balance(t.tenant_id, users[2]).await?.expect("bronze paid");
    assert_eq!(cid.bronze_medals, 1);
    assert!(points.balance(t.tenant_id, users[3]).await?.is_none());

    let standings = points.standings(t.tenant_id, 10).await?;
    assert_eq!(standings[0].user_id, users[0]);
    Ok(())
}

#[tokio::test]
async fn level_condition_reads_the_ledger() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    won_deal(&t, user).await?;
    define(&t, "seasoned_closer", json!({ "min_level": 2 })).await?;
    let achievements = t.engine.achievements();

    let first = achievements.check_and_award(t.tenant_id, user, None).await?;
    let codes: Vec<_> = first.iter().map(|a| a.definition.code.as_str()).collect();
    assert!(codes.contains(&"first_sale"));
    assert!(!codes.contains(&"seasoned_closer"));
    assert_eq!(achievements.standing(t.tenant_id, user).await?.level, 1);

    t.engine
        .points()
        .credit_action(t.tenant_id, user, "lead_converted", Uuid::new_v4(), 0.0)
        .await?;
    assert_eq!(achievements.standing(t.tenant_id, user).await?.level, 2);

    let second = achievements.check_and_award(t.tenant_id, user, None).await?;
    let codes: Vec<_> = second.iter().map(|a| a.definition.code.as_str()).collect();
    assert!(codes.contains(&"seasoned_closer"));
    Ok(())
}

#[tokio::test]
async fn days_active_condition_counts_snapshot_days() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    won_deal(&t, user).await?;
    define(&t, "steady_closer", json!({ "min_days_active": 2 })).await?;
    let kpi = t.engine.kpi();
    let achievements = t.engine.achievements();
    let today = Utc::now().date_naive();

    kpi.create_daily_snapshot(t.tenant_id, user, today).await?;
    // A second write on the same day is still one day.
    kpi.increment_kpi(t.tenant_id, user, "revenue", 1.0).await?;
    assert_eq!(achievements.standing(t.tenant_id, user).await?.days_active, 1);
    let first = achievements.check_and_award(t.tenant_id, user, None).await?;
    assert!(first.iter().all(|a| a.definition.code != "steady_closer"));

    kpi.create_daily_snapshot(t.tenant_id, user, today - Duration::days(1))
        .await?;
    assert_eq!(achievements.standing(t.tenant_id, user).await?.days_active, 2);
    let second = achievements.check_and_award(t.tenant_id, user, None).await?;
    let codes: Vec<_> = second.iter().map(|a| a.definition.code.as_str()).collect();
    assert!(codes.contains(&"steady_closer"));
    Ok(())
}
