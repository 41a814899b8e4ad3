//! # Achievement Engine
//!
//! Awards achievement badges when a user's measured trigger value reaches a
//! definition's target and its extra conditions hold, and keeps the per-user
//! streak counters that streak triggers and bonus multipliers read.
//!
//! Non-repeatable achievements are terminal once earned. Repeatable ones are
//! earned again only after a fresh unmet to met transition, so re-running a
//! sweep never double-awards.

pub mod streaks;
pub mod triggers;

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use metrics::counter;
use sea_orm::{DatabaseConnection, Set};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::activity::{ActivitySource, LeadFilter, TaskFilter};
use crate::error::EngineError;
use crate::models::achievement_definition::Model as DefinitionModel;
use crate::models::leaderboard_entry::Medal;
use crate::models::user_achievement::Model as AwardModel;
use crate::models::user_streak::{self, Model as StreakModel};
use crate::period::DateRange;
use crate::points::PointsLedger;
use crate::repositories::{AchievementRepository, LeaderboardRepository, SnapshotRepository};
use crate::seeds;

pub use streaks::{StreakKind, StreakState};
pub use triggers::{AchievementFacts, UserStanding};

/// Pinned achievements a user may show at once.
pub const MAX_PINNED: u64 = 3;

/// An achievement that was just earned (or earned again).
#[derive(Debug, Clone, Serialize)]
pub struct AwardedAchievement {
    pub definition: DefinitionModel,
    pub award: AwardModel,
}

#[derive(Clone)]
pub struct AchievementEngine {
    db: DatabaseConnection,
    activity: Arc<dyn ActivitySource>,
    points: PointsLedger,
}

impl AchievementEngine {
    pub fn new(
        db: DatabaseConnection,
        activity: Arc<dyn ActivitySource>,
        points: PointsLedger,
    ) -> Self {
        Self {
            db,
            activity,
            points,
        }
    }

    /// Create the default definitions; existing codes are left alone.
    pub async fn seed_defaults(&self, tenant_id: Uuid) -> Result<usize, EngineError> {
        let repo = AchievementRepository::new(&self.db, tenant_id);
        let mut count = 0;
        for (code, definition) in seeds::default_achievements() {
            repo.create_definition(definition, code).await?;
            count += 1;
        }
        info!(tenant_id = %tenant_id, count, "Seeded default achievements");
        Ok(count)
    }

    /// Evaluate the active definitions for a user, optionally only those
    /// measuring `metric`, and award every one that is newly met.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, user_id = %user_id))]
    pub async fn check_and_award(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        metric: Option<&str>,
    ) -> Result<Vec<AwardedAchievement>, EngineError> {
        let repo = AchievementRepository::new(&self.db, tenant_id);
        let definitions: Vec<DefinitionModel> = repo
            .active_definitions()
            .await?
            .into_iter()
            .filter(|d| metric.is_none_or(|m| d.metric == m))
            .collect();
        if definitions.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let today = now.date_naive();
        let facts = self.load_facts(tenant_id, user_id, today).await?;
        let standing = self.standing(tenant_id, user_id).await?;

        let mut awarded = Vec::new();
        for definition in &definitions {
            match self
                .evaluate(tenant_id, user_id, definition, &facts, &standing, today)
                .await
            {
                Ok(Some(award)) => awarded.push(award),
                Ok(None) => {}
                Err(err) => warn!(
                    tenant_id = %tenant_id,
                    user_id = %user_id,
                    achievement = %definition.code,
                    error = %err,
                    "Failed to check achievement"
                ),
            }
        }

        if !awarded.is_empty() {
            info!(count = awarded.len(), "Achievements earned");
        }
        Ok(awarded)
    }

    async fn evaluate(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        definition: &DefinitionModel,
        facts: &AchievementFacts,
        standing: &UserStanding,
        today: NaiveDate,
    ) -> Result<Option<AwardedAchievement>, EngineError> {
        let previous = AchievementRepository::new(&self.db, tenant_id)
            .find_award(user_id, definition.id)
            .await?;
        let value = facts.measure(definition.trigger_type, &definition.metric);
        let streak_started_on =
            StreakKind::for_metric(&definition.metric).and_then(|k| facts.streak(k).started_on);

        if !triggers::should_award(definition, previous.as_ref(), value, streak_started_on, today) {
            return Ok(None);
        }
        if !triggers::conditions_met(definition.conditions.as_ref(), standing) {
            return Ok(None);
        }
        self.grant(tenant_id, user_id, definition, previous, value).await
    }

    /// Award an achievement by code regardless of its trigger, used for
    /// event-driven badges. Returns `None` when the code is unknown or a
    /// non-repeatable achievement is already held.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, user_id = %user_id))]
    pub async fn unlock(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        code: &str,
    ) -> Result<Option<AwardedAchievement>, EngineError> {
        let repo = AchievementRepository::new(&self.db, tenant_id);
        let Some(definition) = repo
            .find_definition_by_code(code)
            .await?
            .filter(|d| d.is_active)
        else {
            debug!(code, "No active achievement to unlock");
            return Ok(None);
        };

        let previous = repo.find_award(user_id, definition.id).await?;
        if previous.is_some() && !definition.is_repeatable {
            return Ok(None);
        }

        let facts = self
            .load_facts(tenant_id, user_id, Utc::now().date_naive())
            .await?;
        let value = facts.measure(definition.trigger_type, &definition.metric);
        self.grant(tenant_id, user_id, &definition, previous, value)
            .await
    }

    async fn grant(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        definition: &DefinitionModel,
        previous: Option<AwardModel>,
        value: f64,
    ) -> Result<Option<AwardedAchievement>, EngineError> {
        let repo = AchievementRepository::new(&self.db, tenant_id);
        let award = match previous {
            Some(previous) => repo.record_repeat(previous, value).await?,
            None => match repo.insert_award(user_id, definition.id, value).await {
                Ok(award) => award,
                // Awarded concurrently by another path
                Err(err) if err.is_unique_violation() => return Ok(None),
                Err(err) => return Err(err.into()),
            },
        };

        self.points
            .credit_achievement(
                tenant_id,
                user_id,
                &definition.code,
                award.times_earned,
                definition.points,
            )
            .await?;

        counter!("achievements_awarded_total").increment(1);
        info!(
            tenant_id = %tenant_id,
            user_id = %user_id,
            achievement = %definition.code,
            times_earned = award.times_earned,
            "Achievement awarded"
        );
        Ok(Some(AwardedAchievement {
            definition: definition.clone(),
            award,
        }))
    }

    /// Days active and level, read by the `min_days_active` and `min_level`
    /// conditions.
    pub async fn standing(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<UserStanding, EngineError> {
        Ok(UserStanding {
            days_active: SnapshotRepository::new(&self.db, tenant_id)
                .active_days(user_id)
                .await?,
            level: self.points.level(tenant_id, user_id).await?,
        })
    }

    /// Measure every trigger metric of a user as of `today`.
    pub async fn load_facts(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<AchievementFacts, EngineError> {
        let window = DateRange::day(today).window();
        let mut facts = AchievementFacts::default();

        let stages = self.activity.outcome_stages(tenant_id).await?;
        let won: Vec<_> = self
            .activity
            .leads(tenant_id, &LeadFilter::for_user(user_id))
            .await?
            .into_iter()
            .filter(|lead| stages.is_won(&lead.status))
            .collect();
        let won_today: Vec<_> = won
            .iter()
            .filter(|lead| window.contains(lead.updated_at))
            .collect();
        facts.set("leads_converted", won_today.len() as f64, won.len() as f64);
        facts.set(
            "revenue",
            won_today.iter().map(|l| l.estimated_value).sum(),
            won.iter().map(|l| l.estimated_value).sum(),
        );

        let calls = self.activity.calls(tenant_id, user_id, None).await?;
        let calls_today = calls.iter().filter(|c| window.contains(c.started_at)).count();
        facts.set("calls_made", calls_today as f64, calls.len() as f64);

        let tasks = self
            .activity
            .tasks(
                tenant_id,
                &TaskFilter {
                    assigned_to: Some(user_id),
                    completed_only: true,
                    ..Default::default()
                },
            )
            .await?;
        let tasks_today = tasks
            .iter()
            .filter(|t| t.completed_at.is_some_and(|at| window.contains(at)))
            .count();
        facts.set("tasks_completed", tasks_today as f64, tasks.len() as f64);

        let snapshots = SnapshotRepository::new(&self.db, tenant_id)
            .daily_in_range(user_id, DateRange::day(today))
            .await?;
        let kpi_today = if snapshots.is_empty() {
            0.0
        } else {
            snapshots.iter().map(|s| s.score as f64).sum::<f64>() / snapshots.len() as f64
        };
        facts.set("kpi_score", kpi_today, 0.0);

        let boards = LeaderboardRepository::new(&self.db, tenant_id);
        let gold_today = boards.count_medal(user_id, Medal::Gold, Some(window)).await?;
        let gold_total = boards.count_medal(user_id, Medal::Gold, None).await?;
        facts.set("gold_medals", gold_today as f64, gold_total as f64);
        let first_places = boards.count_first_places(user_id).await?;
        facts.set("first_place_count", 0.0, first_places as f64);

        for streak in AchievementRepository::new(&self.db, tenant_id)
            .list_streaks(user_id)
            .await?
        {
            if let Some(kind) = StreakKind::ALL
                .into_iter()
                .find(|k| k.as_str() == streak.streak_type)
            {
                facts.set_streak(kind, StreakState::from(&streak));
            }
        }

        Ok(facts)
    }

    pub async fn mark_as_seen(
        &self,
        tenant_id: Uuid,
        award_id: Uuid,
    ) -> Result<AwardModel, EngineError> {
        let repo = AchievementRepository::new(&self.db, tenant_id);
        let award = repo
            .find_award_by_id(award_id)
            .await?
            .ok_or_else(|| EngineError::not_found("achievement", award_id))?;
        if award.is_seen {
            return Ok(award);
        }
        Ok(repo.set_seen(award).await?)
    }

    pub async fn mark_all_as_seen(&self, tenant_id: Uuid, user_id: Uuid) -> Result<u64, EngineError> {
        Ok(AchievementRepository::new(&self.db, tenant_id)
            .set_all_seen(user_id)
            .await?)
    }

    /// Flip the pinned flag. Pinning beyond [`MAX_PINNED`] is rejected.
    pub async fn toggle_pin(
        &self,
        tenant_id: Uuid,
        award_id: Uuid,
    ) -> Result<AwardModel, EngineError> {
        let repo = AchievementRepository::new(&self.db, tenant_id);
        let award = repo
            .find_award_by_id(award_id)
            .await?
            .ok_or_else(|| EngineError::not_found("achievement", award_id))?;

        if !award.is_pinned && repo.count_pinned(award.user_id).await? >= MAX_PINNED {
            return Err(EngineError::LimitExceeded(format!(
                "at most {MAX_PINNED} achievements can be pinned"
            )));
        }

        let pinned = !award.is_pinned;
        Ok(repo.set_pinned(award, pinned).await?)
    }

    pub async fn user_achievements(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<(AwardModel, Option<DefinitionModel>)>, EngineError> {
        Ok(AchievementRepository::new(&self.db, tenant_id)
            .list_awards(user_id)
            .await?)
    }

    /// Settle every streak of a user for a finished `day`: qualifying days
    /// extend the streak, anything else resets it.
    pub async fn process_streaks(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        day: NaiveDate,
    ) -> Result<Vec<StreakModel>, EngineError> {
        let mut updated = Vec::new();
        for kind in StreakKind::ALL {
            let qualified = self.qualifies(tenant_id, user_id, kind, day).await?;
            if let Some(streak) = self
                .update_streak(tenant_id, user_id, kind, day, qualified)
                .await?
            {
                updated.push(streak);
            }
        }
        Ok(updated)
    }

    /// Extend a streak as soon as today's activity qualifies. Never resets;
    /// failed days are settled by [`Self::process_streaks`].
    pub async fn record_activity(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        kind: StreakKind,
        day: NaiveDate,
    ) -> Result<Option<StreakModel>, EngineError> {
        if !self.qualifies(tenant_id, user_id, kind, day).await? {
            return Ok(None);
        }
        self.update_streak(tenant_id, user_id, kind, day, true).await
    }

    async fn qualifies(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        kind: StreakKind,
        day: NaiveDate,
    ) -> Result<bool, EngineError> {
        let window = DateRange::day(day).window();
        Ok(match kind {
            StreakKind::DailyTarget => {
                let snapshots = SnapshotRepository::new(&self.db, tenant_id)
                    .daily_in_range(user_id, DateRange::day(day))
                    .await?;
                !snapshots.is_empty()
                    && snapshots.iter().map(|s| s.achievement_percent).sum::<f64>()
                        / snapshots.len() as f64
                        >= streaks::DAILY_TARGET_PERCENT
            }
            StreakKind::Calls => {
                let calls = self
                    .activity
                    .calls(tenant_id, user_id, Some(window))
                    .await?;
                calls.iter().filter(|c| c.connected()).count() >= streaks::CALLS_PER_DAY
            }
            StreakKind::Tasks => {
                let tasks = self
                    .activity
                    .tasks(
                        tenant_id,
                        &TaskFilter {
                            assigned_to: Some(user_id),
                            completed_in: Some(window),
                            ..Default::default()
                        },
                    )
                    .await?;
                tasks.len() >= streaks::TASKS_PER_DAY
            }
        })
    }

    async fn update_streak(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        kind: StreakKind,
        day: NaiveDate,
        qualified: bool,
    ) -> Result<Option<StreakModel>, EngineError> {
        let repo = AchievementRepository::new(&self.db, tenant_id);
        let existing = repo.find_streak(user_id, kind.as_str()).await?;
        let state = existing.as_ref().map(StreakState::from).unwrap_or_default();
        let next = state.record_day(day, qualified);

        if next == state {
            return Ok(existing);
        }

        let active = user_streak::ActiveModel {
            user_id: Set(user_id),
            streak_type: Set(kind.as_str().to_string()),
            current_streak: Set(next.current),
            best_streak: Set(next.best),
            last_qualifying_date: Set(next.last_qualifying_date),
            started_on: Set(next.started_on),
            ..Default::default()
        };
        let saved = repo.save_streak(active, existing).await?;
        debug!(
            user_id = %user_id,
            streak = kind.as_str(),
            current = saved.current_streak,
            "Streak updated"
        );
        Ok(Some(saved))
    }

    pub async fn streaks(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<StreakModel>, EngineError> {
        Ok(AchievementRepository::new(&self.db, tenant_id)
            .list_streaks(user_id)
            .await?)
    }

    /// Bonus multiplier from the user's current daily target streak.
    pub async fn streak_multiplier(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<f64, EngineError> {
        let current = AchievementRepository::new(&self.db, tenant_id)
            .find_streak(user_id, StreakKind::DailyTarget.as_str())
            .await?
            .map(|s| s.current_streak)
            .unwrap_or(0);
        Ok(streaks::multiplier(current))
    }
}
