//! # Leaderboard Ranker
//!
//! Turns period summaries into ranked leaderboard entries, hands out medals
//! on weekly and monthly boards and keeps the all-time records table.
//! Top-N pages are cached per page size and dropped by key after every
//! refresh of the board.

pub mod ranking;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{DatabaseConnection, IntoActiveModel, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::activity::ActivitySource;
use crate::cache::{CacheKey, KeyedCache, LEADERBOARD_PAGE_LIMITS};
use crate::error::EngineError;
use crate::kpi::scoring;
use crate::models::leaderboard_entry::{self, Model as EntryModel};
use crate::models::leaderboard_record::{self, Model as RecordModel};
use crate::period::{Period, PeriodType};
use crate::repositories::leaderboard::MedalCounts;
use crate::repositories::{LeaderboardRepository, SnapshotRepository};

/// Outcome of one leaderboard refresh.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardUpdate {
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub entries: usize,
    /// Entries of users no longer on the team
    pub removed: u64,
    /// Record types whose value was replaced
    pub records_broken: Vec<String>,
    /// Users whose rank on this board moved since the last refresh
    pub moves: Vec<RankMove>,
}

/// A user's rank before and after a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankMove {
    pub user_id: Uuid,
    pub from: i32,
    pub to: i32,
}

impl RankMove {
    /// Places climbed; negative when the user dropped.
    pub fn change(&self) -> i32 {
        self.from - self.to
    }
}

/// A user's entry and the entries ranked around it.
#[derive(Debug, Clone, Serialize)]
pub struct Neighbourhood {
    pub entry: EntryModel,
    pub around: Vec<EntryModel>,
}

struct RankedRow {
    user_id: Uuid,
    total_score: f64,
    weighted_score: f64,
    metric_values: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone)]
pub struct LeaderboardRanker {
    db: DatabaseConnection,
    activity: Arc<dyn ActivitySource>,
    pages: KeyedCache<Vec<EntryModel>>,
}

impl LeaderboardRanker {
    pub fn new(
        db: DatabaseConnection,
        activity: Arc<dyn ActivitySource>,
        pages: KeyedCache<Vec<EntryModel>>,
    ) -> Self {
        Self {
            db,
            activity,
            pages,
        }
    }

    /// Re-rank the board of the period containing `date` from its summaries.
    /// Every active member is ranked, scoring 0 without a summary, and the
    /// entries of members who left the team are removed.
    #[instrument(skip(self))]
    pub async fn update_leaderboard(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        date: NaiveDate,
    ) -> Result<LeaderboardUpdate, EngineError> {
        let period = period_type.bounds_for(date);
        let team: Vec<Uuid> = self
            .activity
            .sales_team(tenant_id)
            .await?
            .into_iter()
            .map(|member| member.user_id)
            .collect();

        let summaries = SnapshotRepository::new(&self.db, tenant_id)
            .summaries_for_period(period_type, period.start)
            .await?;
        let mut by_user: HashMap<Uuid, _> = summaries
            .into_iter()
            .map(|summary| (summary.user_id, summary))
            .collect();

        let rows: Vec<RankedRow> = team
            .iter()
            .map(|user_id| match by_user.get(user_id) {
                Some(summary) => {
                    let lines = summary.metric_scores();
                    RankedRow {
                        user_id: *user_id,
                        total_score: summary.overall_score as f64,
                        weighted_score: scoring::weighted_score(&lines),
                        metric_values: lines
                            .iter()
                            .map(|line| {
                                (line.metric_type.clone(), serde_json::json!(line.avg_actual))
                            })
                            .collect(),
                    }
                }
                None => RankedRow {
                    user_id: *user_id,
                    total_score: 0.0,
                    weighted_score: 0.0,
                    metric_values: serde_json::Map::new(),
                },
            })
            .collect();

        let ranks = ranking::competition_ranks(
            &rows
                .iter()
                .map(|row| (row.user_id, row.weighted_score))
                .collect::<Vec<_>>(),
        );
        let rows: HashMap<Uuid, RankedRow> =
            rows.into_iter().map(|row| (row.user_id, row)).collect();

        let now = Utc::now();
        let previous_start = period.previous().start;
        let txn = self.db.begin().await?;
        let boards = LeaderboardRepository::new(&txn, tenant_id);
        let summaries_repo = SnapshotRepository::new(&txn, tenant_id);
        let mut saved = Vec::with_capacity(ranks.len());
        let mut moves = Vec::new();

        let removed = boards
            .delete_entries_except(period_type, period.start, &team)
            .await?;

        for (user_id, rank) in &ranks {
            let Some(row) = rows.get(user_id) else {
                continue;
            };
            let previous_rank = boards
                .find_entry(*user_id, period_type, previous_start)
                .await?
                .map(|entry| entry.rank);
            let existing = boards.find_entry(*user_id, period_type, period.start).await?;
            if let Some(current) = existing.as_ref().filter(|e| e.rank != *rank) {
                moves.push(RankMove {
                    user_id: *user_id,
                    from: current.rank,
                    to: *rank,
                });
            }

            let entry = leaderboard_entry::ActiveModel {
                id: Set(Uuid::new_v4()),
                tenant_id: Set(tenant_id),
                user_id: Set(*user_id),
                period_type: Set(period_type),
                period_start: Set(period.start),
                period_end: Set(period.end),
                total_score: Set(row.total_score),
                weighted_score: Set(row.weighted_score),
                metric_values: Set(serde_json::Value::Object(row.metric_values.clone())),
                rank: Set(*rank),
                previous_rank: Set(previous_rank),
                rank_change: Set(ranking::rank_change(previous_rank, *rank)),
                medal: Set(ranking::medal_for(period_type, *rank)),
                updated_at: Set(now),
            };
            saved.push(boards.save_entry(entry, existing).await?);

            if let Some(summary) = by_user.remove(user_id) {
                let change = ranking::rank_change(summary.previous_rank, *rank);
                if summary.rank != Some(*rank) || summary.rank_change != change {
                    let mut active = summary.into_active_model();
                    active.rank = Set(Some(*rank));
                    active.rank_change = Set(change);
                    summaries_repo.update_summary(active).await?;
                }
            }
        }

        let records_broken = if period_type.awards_medals() {
            update_records(&boards, &period, &saved).await?
        } else {
            Vec::new()
        };
        txn.commit().await?;

        self.pages
            .invalidate(&CacheKey::leaderboard_pages(
                tenant_id,
                period_type,
                period.start,
            ))
            .await;

        info!(
            tenant_id = %tenant_id,
            period_type = %period_type,
            period_start = %period.start,
            entries = saved.len(),
            removed,
            records_broken = records_broken.len(),
            "Leaderboard updated"
        );

        Ok(LeaderboardUpdate {
            period_type,
            period_start: period.start,
            entries: saved.len(),
            removed,
            records_broken,
            moves,
        })
    }

    /// The first `limit` entries of the board containing `date`.
    pub async fn top(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        date: NaiveDate,
        limit: u64,
    ) -> Result<Vec<EntryModel>, EngineError> {
        let period = period_type.bounds_for(date);
        let cacheable = LEADERBOARD_PAGE_LIMITS.contains(&limit);
        let key = CacheKey::leaderboard_page(tenant_id, period_type, period.start, limit);
        if cacheable {
            if let Some(cached) = self.pages.get(&key).await {
                return Ok(cached);
            }
        }

        let entries = LeaderboardRepository::new(&self.db, tenant_id)
            .ranked(period_type, period.start, Some(limit))
            .await?;
        if cacheable {
            self.pages.put(key, entries.clone()).await;
        }
        Ok(entries)
    }

    /// The user's entry with everyone ranked within `radius` places of it.
    pub async fn neighbourhood(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        period_type: PeriodType,
        date: NaiveDate,
        radius: i32,
    ) -> Result<Option<Neighbourhood>, EngineError> {
        let period = period_type.bounds_for(date);
        let repo = LeaderboardRepository::new(&self.db, tenant_id);
        let Some(entry) = repo.find_entry(user_id, period_type, period.start).await? else {
            return Ok(None);
        };
        let radius = radius.max(0);
        let around = repo
            .rank_window(
                period_type,
                period.start,
                (entry.rank - radius).max(1),
                entry.rank + radius,
            )
            .await?;
        Ok(Some(Neighbourhood { entry, around }))
    }

    pub async fn medal_counts(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<MedalCounts, EngineError> {
        Ok(LeaderboardRepository::new(&self.db, tenant_id)
            .medal_counts(user_id)
            .await?)
    }

    pub async fn records(&self, tenant_id: Uuid) -> Result<Vec<RecordModel>, EngineError> {
        Ok(LeaderboardRepository::new(&self.db, tenant_id)
            .list_records()
            .await?)
    }
}

/// Record types tracked for a board and how each reads its value.
fn record_candidates(period_type: PeriodType) -> [(String, fn(&EntryModel) -> f64); 3] {
    [
        (format!("highest_{period_type}_score"), |e| e.total_score),
        (format!("highest_revenue_{period_type}"), |e| {
            e.metric_value("revenue")
        }),
        (format!("most_leads_{period_type}"), |e| {
            e.metric_value("leads_converted")
        }),
    ]
}

/// Compare the board's best values to the stored records and replace the
/// ones strictly beaten.
async fn update_records<C: sea_orm::ConnectionTrait>(
    boards: &LeaderboardRepository<'_, C>,
    period: &Period,
    entries: &[EntryModel],
) -> Result<Vec<String>, EngineError> {
    let mut broken = Vec::new();
    for (record_type, read) in record_candidates(period.period_type) {
        let Some(best) = entries
            .iter()
            .max_by(|a, b| read(a).total_cmp(&read(b)).then_with(|| b.rank.cmp(&a.rank)))
        else {
            continue;
        };
        let value = read(best);
        let current = boards.find_record(&record_type).await?;
        if !ranking::beats_record(value, current.as_ref().map(|r| r.value)) {
            continue;
        }

        let record = leaderboard_record::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(best.tenant_id),
            record_type: Set(record_type.clone()),
            user_id: Set(best.user_id),
            value: Set(value),
            period_type: Set(period.period_type),
            period_start: Set(period.start),
            previous_user_id: Set(current.as_ref().map(|r| r.user_id)),
            previous_value: Set(current.as_ref().map(|r| r.value)),
            achieved_at: Set(Utc::now()),
        };
        boards.save_record(record, current).await?;
        broken.push(record_type);
    }
    Ok(broken)
}
