//! Leaderboard ranking, medals, records and the page cache.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use performance_engine::models::leaderboard_entry::Medal;
use performance_engine::period::PeriodType;
use performance_engine::scheduler::EngineScheduler;
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{TestEngine, add_member, deactivate_member, setup_engine};

/// Four members with revenue 80M, 20M, 20M and 5M today.
async fn seed_team(t: &TestEngine) -> Result<[Uuid; 4]> {
    let mut users = [Uuid::nil(); 4];
    for (slot, (name, revenue)) in users.iter_mut().zip([
        ("Ann", 80_000_000.0),
        ("Ben", 20_000_000.0),
        ("Cid", 20_000_000.0),
        ("Dee", 5_000_000.0),
    ]) {
        let user = add_member(&t.db, t.tenant_id, name).await?;
        t.engine
            .kpi()
            .increment_kpi(t.tenant_id, user, "revenue", revenue)
            .await?;
        *slot = user;
    }
    Ok(users)
}

fn scheduler(t: &TestEngine) -> EngineScheduler {
    EngineScheduler::new(Arc::new(t.engine.clone()), Default::default())
}

#[tokio::test]
async fn ties_share_a_rank_and_skip_the_next() -> Result<()> {
    let t = setup_engine().await?;
    let [ann, ben, cid, dee] = seed_team(&t).await?;
    let today = Utc::now().date_naive();
    let scheduler = scheduler(&t);

    scheduler
        .run_period_summary(t.tenant_id, PeriodType::Monthly, today)
        .await?;
    let report = scheduler
        .run_leaderboard_update(t.tenant_id, PeriodType::Monthly)
        .await?;
    assert_eq!(report.processed, 4);

    let board = t
        .engine
        .leaderboard()
        .top(t.tenant_id, PeriodType::Monthly, today, 10)
        .await?;
    let rank_of = |user: Uuid| board.iter().find(|e| e.user_id == user).map(|e| e.rank);
    assert_eq!(rank_of(ann), Some(1));
    assert_eq!(rank_of(ben), Some(2));
    assert_eq!(rank_of(cid), Some(2));
    assert_eq!(rank_of(dee), Some(4));

    let medal_of = |user: Uuid| board.iter().find(|e| e.user_id == user).and_then(|e| e.medal);
    assert_eq!(medal_of(ann), Some(Medal::Gold));
    assert_eq!(medal_of(ben), Some(Medal::Silver));
    assert_eq!(medal_of(cid), Some(Medal::Silver));
    assert_eq!(medal_of(dee), None);
    Ok(())
}

#[tokio::test]
async fn daily_board_has_no_medals() -> Result<()> {
    let t = setup_engine().await?;
    seed_team(&t).await?;
    let today = Utc::now().date_naive();
    let scheduler = scheduler(&t);

    scheduler
        .run_period_summary(t.tenant_id, PeriodType::Daily, today)
        .await?;
    scheduler
        .run_leaderboard_update(t.tenant_id, PeriodType::Daily)
        .await?;

    let board = t
        .engine
        .leaderboard()
        .top(t.tenant_id, PeriodType::Daily, today, 10)
        .await?;
    assert_eq!(board.len(), 4);
    assert!(board.iter().all(|entry| entry.medal.is_none()));
    Ok(())
}

#[tokio::test]
async fn records_are_only_replaced_by_a_higher_value() -> Result<()> {
    let t = setup_engine().await?;
    seed_team(&t).await?;
    let today = Utc::now().date_naive();
    scheduler(&t)
        .run_period_summary(t.tenant_id, PeriodType::Weekly, today)
        .await?;

    let ranker = t.engine.leaderboard();
    let first = ranker
        .update_leaderboard(t.tenant_id, PeriodType::Weekly, today)
        .await?;
    assert!(!first.records_broken.is_empty());

    let second = ranker
        .update_leaderboard(t.tenant_id, PeriodType::Weekly, today)
        .await?;
    assert!(second.records_broken.is_empty());
    Ok(())
}

#[tokio::test]
async fn refresh_invalidates_cached_pages() -> Result<()> {
    let t = setup_engine().await?;
    let [ann, ..] = seed_team(&t).await?;
    let today = Utc::now().date_naive();
    let scheduler = scheduler(&t);
    scheduler
        .run_period_summary(t.tenant_id, PeriodType::Monthly, today)
        .await?;
    scheduler
        .run_leaderboard_update(t.tenant_id, PeriodType::Monthly)
        .await?;

    let ranker = t.engine.leaderboard();
    let cached = ranker.top(t.tenant_id, PeriodType::Monthly, today, 5).await?;
    assert_eq!(cached.len(), 4);

    let late = add_member(&t.db, t.tenant_id, "Eve").await?;
    t.engine
        .kpi()
        .increment_kpi(t.tenant_id, late, "revenue", 1_000_000.0)
        .await?;
    scheduler
        .run_period_summary(t.tenant_id, PeriodType::Monthly, today)
        .await?;
    scheduler
        .run_leaderboard_update(t.tenant_id, PeriodType::Monthly)
        .await?;

    let fresh = ranker.top(t.tenant_id, PeriodType::Monthly, today, 5).await?;
    assert_eq!(fresh.len(), 5);
    assert_eq!(fresh[0].user_id, ann);

    let around = ranker
        .neighbourhood(t.tenant_id, late, PeriodType::Monthly, today, 1)
        .await?
        .expect("late joiner is ranked");
    assert_eq!(around.entry.rank, 5);
    assert_eq!(around.around.len(), 2);
    Ok(())
}

#[tokio::test]
async fn departed_members_leave_the_board() -> Result<()> {
    let t = setup_engine().await?;
    let [ann, ben, cid, dee] = seed_team(&t).await?;
    let today = Utc::now().date_naive();
    let scheduler = scheduler(&t);
    scheduler
        .run_period_summary(t.tenant_id, PeriodType::Monthly, today)
        .await?;
    scheduler
        .run_leaderboard_update(t.tenant_id, PeriodType::Monthly)
        .await?;

    deactivate_member(&t.db, t.tenant_id, ann).await?;
    let update = t
        .engine
        .leaderboard()
        .update_leaderboard(t.tenant_id, PeriodType::Monthly, today)
        .await?;
    assert_eq!(update.removed, 1);

    let board = t
        .engine
        .leaderboard()
        .top(t.tenant_id, PeriodType::Monthly, today, 10)
        .await?;
    assert_eq!(board.len(), 3);
    assert!(board.iter().all(|entry| entry.user_id != ann));

    let entry_of = |user: Uuid| board.iter().find(|e| e.user_id == user);
    for user in [ben, cid] {
        let entry = entry_of(user).expect("still ranked");
        assert_eq!(entry.rank, 1);
        assert_eq!(entry.medal, Some(Medal::Gold));
    }
    let last = entry_of(dee).expect("still ranked");
    assert_eq!(last.rank, 3);
    assert_eq!(last.medal, Some(Medal::Bronze));
    assert_eq!(board.iter().filter(|e| e.rank == 1).count(), 2);
    Ok(())
}

#[tokio::test]
async fn members_without_a_summary_rank_last_at_zero() -> Result<()> {
    let t = setup_engine().await?;
    let [ann, ..] = seed_team(&t).await?;
    let today = Utc::now().date_naive();
    scheduler(&t)
        .run_period_summary(t.tenant_id, PeriodType::Monthly, today)
        .await?;
    let idle = add_member(&t.db, t.tenant_id, "Ivy").await?;

    let update = t
        .engine
        .leaderboard()
        .update_leaderboard(t.tenant_id, PeriodType::Monthly, today)
        .await?;
    assert_eq!(update.entries, 5);

    let board = t
        .engine
        .leaderboard()
        .top(t.tenant_id, PeriodType::Monthly, today, 10)
        .await?;
    assert_eq!(board[0].user_id, ann);
    let last = board.last().expect("board is not empty");
    assert_eq!(last.user_id, idle);
    assert_eq!(last.rank, 5);
    assert_eq!(last.weighted_score, 0.0);
    assert_eq!(last.total_score, 0.0);
    assert_eq!(last.medal, None);
    Ok(())
}
