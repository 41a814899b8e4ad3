//! Penalty escalation, appeals and bonus settlement against SQLite.

use anyhow::Result;
use chrono::{Duration, Utc};
use performance_engine::config::EngineConfig;
use performance_engine::error::EngineError;
use performance_engine::models::bonus_calculation::BonusStatus;
use performance_engine::models::penalty::PenaltyStatus;
use performance_engine::penalties::{Issuance, ManualPenalty, Violation};
use performance_engine::repositories::penalty::RelatedEntity;
use performance_engine::repositories::{BonusRepository, PenaltyRepository};
use performance_engine::seeds;
use sea_orm::Set;
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{TestEngine, add_member, setup_engine, setup_engine_with};

fn violation(user_id: Uuid, lead_id: Uuid) -> Violation {
    Violation {
        user_id,
        related: Some(RelatedEntity::new("lead", lead_id)),
        description: "lead waiting for first contact".to_string(),
    }
}

async fn manual_penalty(t: &TestEngine, user_id: Uuid, amount: f64) -> Result<Uuid> {
    let penalty = t
        .engine
        .penalties()
        .issue_manual(
            t.tenant_id,
            ManualPenalty {
                user_id,
                rule_id: None,
                reason: "Missed the weekly review".to_string(),
                amount,
                related: None,
                issued_by: Some(Uuid::new_v4()),
            },
        )
        .await?;
    Ok(penalty.id)
}

#[tokio::test]
async fn warnings_escalate_to_a_penalty() -> Result<()> {
    let t = setup_engine_with(EngineConfig {
        default_warning_threshold: 2,
        ..Default::default()
    })
    .await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    let rule = PenaltyRepository::new(&t.db, t.tenant_id)
        .find_rule_by_code("lead_not_contacted_24h")
        .await?
        .expect("default rule seeded");
    let penalties = t.engine.penalties();
    let now = Utc::now();

    let first_lead = Uuid::new_v4();
    let first = penalties
        .issue_for_violation(t.tenant_id, &rule, &violation(user, first_lead), now)
        .await?;
    assert!(matches!(first, Issuance::Warning(ref w) if w.warning_number == 1));

    let second = penalties
        .issue_for_violation(t.tenant_id, &rule, &violation(user, Uuid::new_v4()), now)
        .await?;
    assert!(matches!(second, Issuance::Warning(ref w) if w.warning_number == 2));

    let third = penalties
        .issue_for_violation(t.tenant_id, &rule, &violation(user, Uuid::new_v4()), now)
        .await?;
    match third {
        Issuance::Penalty(penalty) => {
            assert_eq!(penalty.amount, rule.penalty_amount);
            assert_eq!(penalty.status, PenaltyStatus::Pending);
        }
        other => panic!("expected a penalty, got {other:?}"),
    }

    // Same rule, entity and day.
    let repeat = penalties
        .issue_for_violation(t.tenant_id, &rule, &violation(user, first_lead), now)
        .await?;
    assert_eq!(repeat, Issuance::Duplicate);

    let summary = penalties.user_summary(t.tenant_id, user, now).await?;
    assert_eq!(summary.total_warnings, 2);
    assert_eq!(summary.total_penalties, 1);
    assert_eq!(summary.pending_count, 1);
    Ok(())
}

#[tokio::test]
async fn appeal_window_closes() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    let penalty_id = manual_penalty(&t, user, 50_000.0).await?;
    let penalties = t.engine.penalties();

    let late = penalties
        .submit_appeal(t.tenant_id, penalty_id, "I was on leave", Utc::now() + Duration::days(8))
        .await
        .expect_err("deadline passed");
    assert!(matches!(late, EngineError::InvalidTransition { .. }));

    let blank = penalties
        .submit_appeal(t.tenant_id, penalty_id, "  ", Utc::now())
        .await
        .expect_err("reason required");
    assert!(matches!(blank, EngineError::Validation(_)));

    let appealed = penalties
        .submit_appeal(t.tenant_id, penalty_id, "I was on leave", Utc::now())
        .await?;
    assert_eq!(appealed.status, PenaltyStatus::Appealed);
    assert_eq!(penalties.awaiting_review(t.tenant_id).await?.len(), 1);

    let approved = penalties
        .review_appeal(t.tenant_id, penalty_id, Uuid::new_v4(), true, Some("Leave confirmed".to_string()))
        .await?;
    assert_eq!(approved.status, PenaltyStatus::AppealApproved);
    assert_eq!(approved.amount, 0.0);

    let again = penalties
        .review_appeal(t.tenant_id, penalty_id, Uuid::new_v4(), false, None)
        .await
        .expect_err("already reviewed");
    assert!(matches!(again, EngineError::InvalidTransition { .. }));
    Ok(())
}

#[tokio::test]
async fn unqualified_user_earns_nothing() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    let (name, _) = seeds::default_bonus_setting();
    let setting = BonusRepository::new(&t.db, t.tenant_id)
        .find_setting_by_name(name)
        .await?
        .expect("default scheme seeded");

    let calculation = t
        .engine
        .bonuses()
        .calculate_user_bonus(t.tenant_id, user, &setting, Utc::now().date_naive(), None)
        .await?;
    assert!(!calculation.is_qualified);
    assert!(calculation.disqualification_reason.is_some());
    assert_eq!(calculation.final_amount, 0.0);
    assert_eq!(calculation.net_amount, 0.0);
    Ok(())
}

#[tokio::test]
async fn penalties_are_deducted_once() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    let (_, mut open_scheme) = seeds::default_bonus_setting();
    open_scheme.min_kpi_score = Set(0);
    open_scheme.min_working_days = Set(0);
    open_scheme.auto_calculate = Set(false);
    let setting = BonusRepository::new(&t.db, t.tenant_id)
        .create_setting(open_scheme, "Open bonus")
        .await?;

    let bonuses = t.engine.bonuses();
    let today = Utc::now().date_naive();
    let calculation = bonuses
        .calculate_user_bonus(t.tenant_id, user, &setting, today, None)
        .await?;
    assert!(calculation.is_qualified);
    assert_eq!(calculation.final_amount, 500_000.0);

    let penalty_id = manual_penalty(&t, user, 50_000.0).await?;
    // Pending penalties are not deducted.
    let untouched = bonuses.deduct_penalties(t.tenant_id, calculation.id).await?;
    assert_eq!(untouched.penalty_deductions, 0.0);

    t.engine
        .penalties()
        .confirm(t.tenant_id, penalty_id, Uuid::new_v4())
        .await?;
    let deducted = bonuses.deduct_penalties(t.tenant_id, calculation.id).await?;
    assert_eq!(deducted.penalty_deductions, 50_000.0);
    assert_eq!(deducted.net_amount, 450_000.0);

    let twice = bonuses.deduct_penalties(t.tenant_id, calculation.id).await?;
    assert_eq!(twice.penalty_deductions, 50_000.0);
    assert_eq!(twice.net_amount, 450_000.0);

    // Recalculation keeps the linked deduction.
    let recalculated = bonuses
        .calculate_user_bonus(t.tenant_id, user, &setting, today, None)
        .await?;
    assert_eq!(recalculated.id, calculation.id);
    assert_eq!(recalculated.net_amount, 450_000.0);
    Ok(())
}

#[tokio::test]
async fn bonus_workflow_locks_after_approval() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    let other = add_member(&t.db, t.tenant_id, "Eli").await?;
    let (name, _) = seeds::default_bonus_setting();
    let setting = BonusRepository::new(&t.db, t.tenant_id)
        .find_setting_by_name(name)
        .await?
        .expect("default scheme seeded");
    let bonuses = t.engine.bonuses();
    let today = Utc::now().date_naive();

    let calculation = bonuses
        .calculate_user_bonus(t.tenant_id, user, &setting, today, None)
        .await?;
    let err = bonuses
        .mark_paid(t.tenant_id, calculation.id, None)
        .await
        .expect_err("must be approved first");
    assert!(matches!(err, EngineError::InvalidTransition { .. }));

    let approved = bonuses.approve(t.tenant_id, calculation.id, Uuid::new_v4()).await?;
    assert_eq!(approved.status, BonusStatus::Approved);
    let locked = bonuses
        .calculate_user_bonus(t.tenant_id, user, &setting, today, None)
        .await
        .expect_err("approved calculations are locked");
    assert!(matches!(locked, EngineError::InvalidTransition { .. }));

    let paid = bonuses
        .mark_paid(t.tenant_id, calculation.id, Some("PAY-001".to_string()))
        .await?;
    assert_eq!(paid.status, BonusStatus::Paid);
    assert!(paid.paid_at.is_some());

    let second = bonuses
        .calculate_user_bonus(t.tenant_id, other, &setting, today, None)
        .await?;
    let no_reason = bonuses
        .reject(t.tenant_id, second.id, Uuid::new_v4(), "")
        .await
        .expect_err("reason required");
    assert!(matches!(no_reason, EngineError::Validation(_)));
    let rejected = bonuses
        .reject(t.tenant_id, second.id, Uuid::new_v4(), "Data under review")
        .await?;
    assert_eq!(rejected.status, BonusStatus::Rejected);
    Ok(())
}

#[tokio::test]
async fn approved_appeal_restores_the_bonus_net() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    let (_, mut open_scheme) = seeds::default_bonus_setting();
    open_scheme.min_kpi_score = Set(0);
    open_scheme.min_working_days = Set(0);
    open_scheme.auto_calculate = Set(false);
    let setting = BonusRepository::new(&t.db, t.tenant_id)
        .create_setting(open_scheme, "Open bonus")
        .await?;

    let bonuses = t.engine.bonuses();
    let penalties = t.engine.penalties();
    let calculation = bonuses
        .calculate_user_bonus(t.tenant_id, user, &setting, Utc::now().date_naive(), None)
        .await?;
    let kept = manual_penalty(&t, user, 20_000.0).await?;
    let voided = manual_penalty(&t, user, 50_000.0).await?;
    for penalty_id in [kept, voided] {
        penalties.confirm(t.tenant_id, penalty_id, Uuid::new_v4()).await?;
    }
    let deducted = bonuses.deduct_penalties(t.tenant_id, calculation.id).await?;
    assert_eq!(deducted.penalty_deductions, 70_000.0);
    assert_eq!(deducted.net_amount, 430_000.0);

    penalties
        .submit_appeal(t.tenant_id, voided, "Client rescheduled", Utc::now())
        .await?;
    let approved = penalties
        .review_appeal(t.tenant_id, voided, Uuid::new_v4(), true, None)
        .await?;
    assert_eq!(approved.deducted_from_bonus_id, Some(calculation.id));

    let refreshed = BonusRepository::new(&t.db, t.tenant_id)
        .find_calculation_by_id(calculation.id)
        .await?
        .expect("calculation exists");
    assert_eq!(refreshed.penalty_deductions, 20_000.0);
    assert_eq!(refreshed.net_amount, 480_000.0);
    Ok(())
}

#[tokio::test]
async fn paid_bonus_is_not_refreshed_by_an_appeal() -> Result<()> {
    let t = setup_engine().await?;
    let user = add_member(&t.db, t.tenant_id, "Dana").await?;
    let (_, mut open_scheme) = seeds::default_bonus_setting();
    open_scheme.min_kpi_score = Set(0);
    open_scheme.min_working_days = Set(0);
    open_scheme.auto_calculate = Set(false);
    let setting = BonusRepository::new(&t.db, t.tenant_id)
        .create_setting(open_scheme, "Open bonus")
        .await?;

    let bonuses = t.engine.bonuses();
    let penalties = t.engine.penalties();
    let calculation = bonuses
        .calculate_user_bonus(t.tenant_id, user, &setting, Utc::now().date_naive(), None)
        .await?;
    let penalty_id = manual_penalty(&t, user, 50_000.0).await?;
    penalties.confirm(t.tenant_id, penalty_id, Uuid::new_v4()).await?;
    bonuses.deduct_penalties(t.tenant_id, calculation.id).await?;
    bonuses.approve(t.tenant_id, calculation.id, Uuid::new_v4()).await?;
    bonuses
        .mark_paid(t.tenant_id, calculation.id, Some("PAY-002".to_string()))
        .await?;

    penalties
        .submit_appeal(t.tenant_id, penalty_id, "Wrong lead", Utc::now())
        .await?;
    penalties
        .review_appeal(t.tenant_id, penalty_id, Uuid::new_v4(), true, None)
        .await?;

    let paid = BonusRepository::new(&t.db, t.tenant_id)
        .find_calculation_by_id(calculation.id)
        .await?
        .expect("calculation exists");
    assert_eq!(paid.status, BonusStatus::Paid);
    assert_eq!(paid.net_amount, 450_000.0);
    Ok(())
}
