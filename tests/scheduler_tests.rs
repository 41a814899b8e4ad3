//! Scheduler ticks across tenants.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use performance_engine::config::SchedulerConfig;
use performance_engine::period::PeriodType;
use performance_engine::repositories::SnapshotRepository;
use performance_engine::scheduler::EngineScheduler;
use tokio_util::sync::CancellationToken;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{add_completed_task, add_member, setup_engine};

#[tokio::test]
async fn tick_ranks_every_tenant_and_is_repeatable() -> Result<()> {
    let t = setup_engine().await?;
    let (other, _) = t.engine.create_tenant("Globex Sales").await?;

    let dana = add_member(&t.db, t.tenant_id, "Dana").await?;
    let eli = add_member(&t.db, t.tenant_id, "Eli").await?;
    add_member(&t.db, other.id, "Fay").await?;
    for _ in 0..20 {
        add_completed_task(&t.db, t.tenant_id, dana, None).await?;
    }
    add_completed_task(&t.db, t.tenant_id, eli, None).await?;

    let scheduler = EngineScheduler::new(
        Arc::new(t.engine.clone()),
        SchedulerConfig {
            chunk_size: 1,
            ..Default::default()
        },
    );
    scheduler.tick().await?;

    let today = Utc::now().date_naive();
    let board = t
        .engine
        .leaderboard()
        .top(t.tenant_id, PeriodType::Monthly, today, 10)
        .await?;
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].user_id, dana);
    let other_board = t
        .engine
        .leaderboard()
        .top(other.id, PeriodType::Monthly, today, 10)
        .await?;
    assert_eq!(other_board.len(), 1);

    let month = PeriodType::Monthly.bounds_for(today).start;
    let summaries = SnapshotRepository::new(&t.db, t.tenant_id);
    let first = summaries
        .find_summary(dana, PeriodType::Monthly, month)
        .await?
        .expect("summary written by tick");

    scheduler.tick().await?;
    let second = summaries
        .find_summary(dana, PeriodType::Monthly, month)
        .await?
        .expect("summary still present");
    assert_eq!(first.id, second.id);
    assert_eq!(first.overall_score, second.overall_score);
    assert_eq!(
        t.engine
            .leaderboard()
            .top(t.tenant_id, PeriodType::Monthly, today, 10)
            .await?
            .len(),
        2
    );
    Ok(())
}

#[tokio::test]
async fn single_sweeps_report_their_members() -> Result<()> {
    let t = setup_engine().await?;
    add_member(&t.db, t.tenant_id, "Dana").await?;
    add_member(&t.db, t.tenant_id, "Eli").await?;
    let scheduler = EngineScheduler::new(Arc::new(t.engine.clone()), Default::default());

    let snapshot = scheduler
        .run_daily_snapshot(t.tenant_id, Utc::now().date_naive())
        .await?;
    assert_eq!((snapshot.processed, snapshot.failed), (2, 0));
    assert_eq!(snapshot.sweep, "daily_snapshot");

    let achievements = scheduler.run_achievement_sweep(t.tenant_id).await?;
    assert_eq!((achievements.processed, achievements.failed), (2, 0));

    let decay = scheduler.run_score_decay(t.tenant_id).await?;
    assert_eq!(decay.failed, 0);
    Ok(())
}

#[tokio::test]
async fn run_stops_when_cancelled() -> Result<()> {
    let t = setup_engine().await?;
    let scheduler = EngineScheduler::new(Arc::new(t.engine.clone()), Default::default());
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(5), scheduler.run(shutdown)).await??;
    Ok(())
}
