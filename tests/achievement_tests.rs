//! Achievement awards, pinning and streaks.

use anyhow::Result;
use chrono::Utc;
use performance_engine::achievements::StreakKind;
use performance_engine::error::EngineError;
use sea_orm::Set;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{add_completed_task, add_lead, add_member, add_stage, setup_engine};

#[tokio::test]
async fn non_repeatable_award_is_granted_once() -> Result<()> {
    let t = setup_engine().await?;
    add_stage(&t.db, t.tenant_id, "won", true, false).await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    add_lead(&t.db, t.tenant_id, Some(user), |lead| {
        lead.status = Set("won".to_string());
        lead.estimated_value = Set(10_000_000.0);
    })
    .await?;

    let achievements = t.engine.achievements();
    let first = achievements.check_and_award(t.tenant_id, user, None).await?;
    let codes: Vec<_> = first.iter().map(|a| a.definition.code.as_str()).collect();
    assert_eq!(codes, vec!["first_sale"]);

    for _ in 0..3 {
        let again = achievements.check_and_award(t.tenant_id, user, None).await?;
        assert!(again.is_empty());
    }
    assert!(achievements.unlock(t.tenant_id, user, "first_sale").await?.is_none());

    let held = achievements.user_achievements(t.tenant_id, user).await?;
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].0.times_earned, 1);
    Ok(())
}

#[tokio::test]
async fn metric_filter_limits_the_check() -> Result<()> {
    let t = setup_engine().await?;
    add_stage(&t.db, t.tenant_id, "won", true, false).await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    add_lead(&t.db, t.tenant_id, Some(user), |lead| {
        lead.status = Set("won".to_string());
    })
    .await?;

    let achievements = t.engine.achievements();
    let calls_only = achievements
        .check_and_award(t.tenant_id, user, Some("calls_made"))
        .await?;
    assert!(calls_only.is_empty());
    let deals = achievements
        .check_and_award(t.tenant_id, user, Some("leads_converted"))
        .await?;
    assert_eq!(deals.len(), 1);
    Ok(())
}

#[tokio::test]
async fn fourth_pin_is_rejected() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    let achievements = t.engine.achievements();

    let mut awards = Vec::new();
    for code in ["first_sale", "big_deal", "deals_10", "tasks_10"] {
        let awarded = achievements
            .unlock(t.tenant_id, user, code)
            .await?
            .expect("seeded code unlocks");
        awards.push(awarded.award.id);
    }

    for award_id in &awards[..3] {
        let pinned = achievements.toggle_pin(t.tenant_id, *award_id).await?;
        assert!(pinned.is_pinned);
    }
    let err = achievements
        .toggle_pin(t.tenant_id, awards[3])
        .await
        .expect_err("a fourth pin exceeds the cap");
    assert!(matches!(err, EngineError::LimitExceeded(_)));

    // Unpinning frees a slot.
    let unpinned = achievements.toggle_pin(t.tenant_id, awards[0]).await?;
    assert!(!unpinned.is_pinned);
    assert!(achievements.toggle_pin(t.tenant_id, awards[3]).await?.is_pinned);
    Ok(())
}

#[tokio::test]
async fn seen_flags_are_cleared_in_bulk() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    let achievements = t.engine.achievements();
    let first = achievements
        .unlock(t.tenant_id, user, "first_sale")
        .await?
        .expect("unlocks");
    achievements.unlock(t.tenant_id, user, "tasks_10").await?;

    assert!(achievements.mark_as_seen(t.tenant_id, first.award.id).await?.is_seen);
    assert_eq!(achievements.mark_all_as_seen(t.tenant_id, user).await?, 1);
    Ok(())
}

#[tokio::test]
async fn task_streak_counts_a_day_once() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    for _ in 0..5 {
        add_completed_task(&t.db, t.tenant_id, user, None).await?;
    }
    let today = Utc::now().date_naive();
    let achievements = t.engine.achievements();

    let extended = achievements
        .record_activity(t.tenant_id, user, StreakKind::Tasks, today)
        .await?
        .expect("five tasks qualify");
    assert_eq!(extended.current_streak, 1);

    achievements.process_streaks(t.tenant_id, user, today).await?;
    let streaks = achievements.streaks(t.tenant_id, user).await?;
    let tasks = streaks
        .iter()
        .find(|s| s.streak_type == StreakKind::Tasks.as_str())
        .expect("task streak stored");
    assert_eq!(tasks.current_streak, 1);
    assert_eq!(tasks.best_streak, 1);
    Ok(())
}
