//! Lead temperature scoring against the seeded default rules.

use anyhow::Result;
use chrono::{Duration, Utc};
use performance_engine::models::lead_score::LeadTemperature;
use performance_engine::repositories::LeadScoreRepository;
use performance_engine::models::crm_lead;
use sea_orm::{ActiveModelTrait, Set};

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{add_lead, add_member, setup_engine};

#[tokio::test]
async fn email_only_lead_scores_sixty() -> Result<()> {
    let t = setup_engine().await?;
    let lead_id = add_lead(&t.db, t.tenant_id, None, |lead| {
        lead.email = Set(Some("buyer@example.com".to_string()));
    })
    .await?;

    let change = t.engine.scorer().score_lead(t.tenant_id, lead_id, "created").await?;
    assert_eq!(change.new_score, 60);
    assert_eq!(change.new_category, LeadTemperature::Warm);
    assert_eq!(change.old_score, None);

    // Unchanged inputs: same score and no history row.
    let again = t.engine.scorer().score_lead(t.tenant_id, lead_id, "manual").await?;
    assert!(!again.changed());
    let history = LeadScoreRepository::new(&t.db, t.tenant_id).history(lead_id).await?;
    assert!(history.is_empty());
    Ok(())
}

#[tokio::test]
async fn rich_lead_is_hot_and_clamped() -> Result<()> {
    let t = setup_engine().await?;
    let owner = add_member(&t.db, t.tenant_id, "Dana").await?;
    let lead_id = add_lead(&t.db, t.tenant_id, Some(owner), |lead| {
        lead.phone = Set(Some("+998901234567".to_string()));
        lead.email = Set(Some("ceo@example.com".to_string()));
        lead.company = Set(Some("Example LLC".to_string()));
        lead.source = Set(Some("referral".to_string()));
        lead.estimated_value = Set(60_000_000.0);
        lead.activities_count = Set(5);
    })
    .await?;

    let change = t.engine.scorer().score_lead(t.tenant_id, lead_id, "created").await?;
    assert_eq!(change.new_score, 100);
    assert_eq!(change.new_category, LeadTemperature::Hot);
    Ok(())
}

#[tokio::test]
async fn stale_lead_loses_points_and_history_records_change() -> Result<()> {
    let t = setup_engine().await?;
    let lead_id = add_lead(&t.db, t.tenant_id, None, |lead| {
        lead.email = Set(Some("buyer@example.com".to_string()));
    })
    .await?;
    t.engine.scorer().score_lead(t.tenant_id, lead_id, "created").await?;

    // Ten days without contact: the 3+ and 7+ day rules both apply.
    crm_lead::ActiveModel {
        id: Set(lead_id),
        created_at: Set(Utc::now() - Duration::days(10)),
        ..Default::default()
    }
    .update(&t.db)
    .await?;

    let change = t.engine.scorer().score_lead(t.tenant_id, lead_id, "recheck").await?;
    assert_eq!(change.old_score, Some(60));
    assert_eq!(change.new_score, 35);

    let history = LeadScoreRepository::new(&t.db, t.tenant_id).history(lead_id).await?;
    assert_eq!(history.len(), 1);
    Ok(())
}
