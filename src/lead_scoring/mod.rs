//! # Lead Temperature Scorer
//!
//! Scores leads (not people) from the tenant's field rules, keeps the score
//! history and cools idle leads down over time.

pub mod rules;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::activity::{ActivitySource, LeadFilter};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::models::lead_score::{LeadTemperature, Model as ScoreModel};
use crate::models::lead_score_history::Model as HistoryModel;
use crate::models::lead_scoring_rule::Model as RuleModel;
use crate::period::start_of_day;
use crate::repositories::LeadScoreRepository;
use crate::seeds;

pub use rules::{Operator, Recommendation};

/// Result of scoring one lead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreChange {
    pub lead_id: Uuid,
    pub old_score: Option<i32>,
    pub new_score: i32,
    pub old_category: Option<LeadTemperature>,
    pub new_category: LeadTemperature,
}

impl ScoreChange {
    pub fn changed(&self) -> bool {
        self.old_score != Some(self.new_score)
    }

    /// Score moved from below `threshold` to at or above it.
    pub fn crossed_up(&self, threshold: i32) -> bool {
        self.old_score.unwrap_or(0) < threshold && self.new_score >= threshold
    }

    /// Score moved from at or above `threshold` to below it.
    pub fn crossed_down(&self, threshold: i32) -> bool {
        self.old_score.is_some_and(|old| old >= threshold) && self.new_score < threshold
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DecayReport {
    pub examined: usize,
    pub decayed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct LeadScorer {
    db: DatabaseConnection,
    activity: Arc<dyn ActivitySource>,
    config: EngineConfig,
}

impl LeadScorer {
    pub fn new(
        db: DatabaseConnection,
        activity: Arc<dyn ActivitySource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            activity,
            config,
        }
    }

    /// Active rules, seeding the default set when the tenant has none at all.
    pub async fn rules(&self, tenant_id: Uuid) -> Result<Vec<RuleModel>, EngineError> {
        let repo = LeadScoreRepository::new(&self.db, tenant_id);
        if repo.count_rules().await? == 0 {
            self.seed_default_rules(tenant_id).await?;
        }
        Ok(repo.active_rules().await?)
    }

    pub async fn seed_default_rules(&self, tenant_id: Uuid) -> Result<usize, EngineError> {
        let repo = LeadScoreRepository::new(&self.db, tenant_id);
        if repo.count_rules().await? > 0 {
            return Ok(0);
        }
        let defaults = seeds::default_lead_rules();
        let count = defaults.len();
        for rule in defaults {
            repo.insert_rule(rule).await?;
        }
        info!(tenant_id = %tenant_id, count, "Seeded default lead scoring rules");
        Ok(count)
    }

    /// Re-evaluate a lead against the rules and store the result.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, lead_id = %lead_id))]
    pub async fn score_lead(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
        reason: &str,
    ) -> Result<ScoreChange, EngineError> {
        let lead = self
            .activity
            .lead(tenant_id, lead_id)
            .await?
            .ok_or_else(|| EngineError::not_found("lead", lead_id))?;
        let rules = self.rules(tenant_id).await?;
        let now = Utc::now();
        let card = rules::score_lead(&rules, &lead, now);
        let breakdown = serde_json::to_value(&card.breakdown)?;

        let existing = LeadScoreRepository::new(&self.db, tenant_id)
            .find_score(lead_id)
            .await?;

        let txn = self.db.begin().await?;
        let repo = LeadScoreRepository::new(&txn, tenant_id);
        let saved = repo
            .save_score(lead_id, card.score, breakdown, now, existing.as_ref())
            .await?;
        if let Some(previous) = existing.as_ref().filter(|e| e.score != saved.score) {
            repo.insert_history(
                lead_id,
                (previous.score, previous.category),
                (saved.score, saved.category),
                reason,
            )
            .await?;
        }
        txn.commit().await?;

        debug!(score = saved.score, category = ?saved.category, "Lead scored");
        Ok(ScoreChange {
            lead_id,
            old_score: existing.as_ref().map(|e| e.score),
            new_score: saved.score,
            old_category: existing.as_ref().map(|e| e.category),
            new_category: saved.category,
        })
    }

    /// Cool down leads nobody engaged with for the configured idle period.
    ///
    /// A lead decays at most once per day: scores already written today are
    /// skipped, so repeated runs on the same day change nothing.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn apply_decay(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<DecayReport, EngineError> {
        let candidates = LeadScoreRepository::new(&self.db, tenant_id)
            .scored_before(start_of_day(now.date_naive()))
            .await?;
        let mut report = DecayReport::default();
        if candidates.is_empty() {
            return Ok(report);
        }

        let stages = self.activity.outcome_stages(tenant_id).await?;
        let leads: HashMap<Uuid, _> = self
            .activity
            .leads(tenant_id, &LeadFilter::default())
            .await?
            .into_iter()
            .map(|lead| (lead.id, lead))
            .collect();
        let idle_after = Duration::days(self.config.lead_decay_idle_days);

        for score in candidates {
            let Some(lead) = leads.get(&score.lead_id) else {
                continue;
            };
            if stages.is_closed(&lead.status) {
                continue;
            }
            report.examined += 1;
            let last_engagement = lead.last_contacted_at.unwrap_or(lead.created_at);
            if now - last_engagement < idle_after {
                continue;
            }
            match self.decay_one(tenant_id, &score, now).await {
                Ok(()) => report.decayed += 1,
                Err(err) => {
                    report.failed += 1;
                    error!(
                        tenant_id = %tenant_id,
                        lead_id = %score.lead_id,
                        error = %err,
                        "Failed to decay lead score"
                    );
                }
            }
        }

        Ok(report)
    }

    async fn decay_one(
        &self,
        tenant_id: Uuid,
        score: &ScoreModel,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let new_score = (score.score - self.config.lead_decay_points).max(0);
        let txn = self.db.begin().await?;
        let repo = LeadScoreRepository::new(&txn, tenant_id);
        let saved = repo
            .save_score(
                score.lead_id,
                new_score,
                score.breakdown.clone(),
                now,
                Some(score),
            )
            .await?;
        if saved.score != score.score {
            repo.insert_history(
                score.lead_id,
                (score.score, score.category),
                (saved.score, saved.category),
                "decay",
            )
            .await?;
        }
        txn.commit().await?;
        Ok(())
    }

    /// Up to five rules the lead could still satisfy, biggest gain first.
    pub async fn recommendations(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Vec<Recommendation>, EngineError> {
        let lead = self
            .activity
            .lead(tenant_id, lead_id)
            .await?
            .ok_or_else(|| EngineError::not_found("lead", lead_id))?;
        let rules = self.rules(tenant_id).await?;
        Ok(rules::recommendations(&rules, &lead, Utc::now()))
    }

    /// Leads at or above the hot threshold, hottest first.
    pub async fn hot_leads(
        &self,
        tenant_id: Uuid,
        limit: u64,
    ) -> Result<Vec<ScoreModel>, EngineError> {
        Ok(LeadScoreRepository::new(&self.db, tenant_id)
            .list_scores(self.config.hot_lead_threshold, limit)
            .await?)
    }

    pub async fn history(
        &self,
        tenant_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Vec<HistoryModel>, EngineError> {
        Ok(LeadScoreRepository::new(&self.db, tenant_id)
            .history(lead_id)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(old: Option<i32>, new: i32) -> ScoreChange {
        ScoreChange {
            lead_id: Uuid::nil(),
            old_score: old,
            new_score: new,
            old_category: old.map(LeadTemperature::from_score),
            new_category: LeadTemperature::from_score(new),
        }
    }

    #[test]
    fn test_threshold_crossings() {
        assert!(change(Some(75), 85).crossed_up(80));
        assert!(change(None, 90).crossed_up(80));
        assert!(!change(Some(80), 95).crossed_up(80));
        assert!(change(Some(45), 35).crossed_down(40));
        assert!(!change(None, 10).crossed_down(40));
        assert!(!change(Some(35), 30).crossed_down(40));
    }

    #[test]
    fn test_unchanged_score_is_not_a_change() {
        assert!(!change(Some(60), 60).changed());
        assert!(change(None, 60).changed());
    }
}
