//! # Penalty / Warning Engine
//!
//! Periodic sweeps run every active auto rule's detector and turn each
//! violation into a warning or a penalty:
//!
//! - at most one issuance per rule, related entity and day;
//! - while the user holds fewer valid warnings for the rule than its
//!   `warning_threshold`, a violation issues a warning;
//! - after that it issues a pending penalty, subject to the rule's daily and
//!   monthly caps.
//!
//! Issued penalties then follow the confirm / appeal / review workflow.

pub mod detectors;

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use metrics::counter;
use sea_orm::{DatabaseConnection, IntoActiveModel, Set, TransactionTrait};
use serde::Serialize;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::activity::ActivitySource;
use crate::bonus::refresh_net_amount;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::models::penalty::{self, Model as PenaltyModel, PenaltyStatus};
use crate::models::penalty_rule::Model as RuleModel;
use crate::models::penalty_warning::{self, Model as WarningModel};
use crate::period::{DateRange, PeriodType};
use crate::repositories::{BonusRepository, PenaltyRepository};
use crate::repositories::penalty::RelatedEntity;
use crate::seeds;

pub use detectors::{Detector, Violation};

/// Months of history covered by the user summary.
const SUMMARY_MONTHS: u32 = 3;

/// What a single violation turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum Issuance {
    Warning(WarningModel),
    Penalty(PenaltyModel),
    /// Already issued for this rule, entity and day
    Duplicate,
    /// The rule's daily or monthly cap is exhausted
    LimitReached,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct PenaltySweepReport {
    pub rules_checked: usize,
    pub violations: usize,
    pub warnings: usize,
    pub duplicates: usize,
    pub limited: usize,
    pub failed: usize,
    pub penalties: Vec<PenaltyModel>,
}

/// Ad-hoc penalty issued by an administrator.
#[derive(Debug, Clone)]
pub struct ManualPenalty {
    pub user_id: Uuid,
    pub rule_id: Option<Uuid>,
    pub reason: String,
    pub amount: f64,
    pub related: Option<RelatedEntity>,
    pub issued_by: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PenaltySummary {
    pub since: Option<NaiveDate>,
    pub total_penalties: usize,
    pub total_warnings: usize,
    pub active_warnings: usize,
    pub pending_count: usize,
    pub confirmed_count: usize,
    pub appealed_count: usize,
    /// Sum of penalties that stand (confirmed or appeal rejected)
    pub confirmed_amount: f64,
    pub pending_amount: f64,
}

#[derive(Clone)]
pub struct PenaltyEngine {
    db: DatabaseConnection,
    activity: Arc<dyn ActivitySource>,
    config: EngineConfig,
}

impl PenaltyEngine {
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

    /// Create the default rule set; existing codes are left alone.
    pub async fn seed_defaults(&self, tenant_id: Uuid) -> Result<usize, EngineError> {
        let repo = PenaltyRepository::new(&self.db, tenant_id);
        let mut count = 0;
        for (code, rule) in seeds::default_penalty_rules(self.config.default_warning_threshold) {
            repo.create_rule(rule, code).await?;
            count += 1;
        }
        info!(tenant_id = %tenant_id, count, "Seeded default penalty rules");
        Ok(count)
    }

    /// Run every active auto rule once. Failures are isolated per rule and
    /// per violation.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn run_sweep(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PenaltySweepReport, EngineError> {
        let rules = PenaltyRepository::new(&self.db, tenant_id)
            .active_auto_rules()
            .await?;
        let mut report = PenaltySweepReport::default();

        for rule in &rules {
            let Some(detector) = Detector::for_rule(rule) else {
                debug!(rule = %rule.code, event = %rule.trigger_event, "No detector for rule");
                continue;
            };
            report.rules_checked += 1;

            let violations = match detector.detect(self.activity.as_ref(), tenant_id, now).await {
                Ok(violations) => violations,
                Err(err) => {
                    report.failed += 1;
                    error!(
                        tenant_id = %tenant_id,
                        rule = %rule.code,
                        error = %err,
                        "Failed to evaluate penalty rule"
                    );
                    continue;
                }
            };

            for violation in violations {
                report.violations += 1;
                match self.issue_for_violation(tenant_id, rule, &violation, now).await {
                    Ok(Issuance::Warning(_)) => report.warnings += 1,
                    Ok(Issuance::Penalty(penalty)) => report.penalties.push(penalty),
                    Ok(Issuance::Duplicate) => report.duplicates += 1,
                    Ok(Issuance::LimitReached) => report.limited += 1,
                    Err(err) => {
                        report.failed += 1;
                        error!(
                            tenant_id = %tenant_id,
                            rule = %rule.code,
                            user_id = %violation.user_id,
                            error = %err,
                            "Failed to issue for violation"
                        );
                    }
                }
            }
        }

        counter!("penalty_warnings_issued_total").increment(report.warnings as u64);
        counter!("penalties_issued_total").increment(report.penalties.len() as u64);
        info!(
            tenant_id = %tenant_id,
            rules_checked = report.rules_checked,
            warnings = report.warnings,
            penalties = report.penalties.len(),
            failed = report.failed,
            "Penalty sweep completed"
        );
        Ok(report)
    }

    /// Apply the dedup and escalation policy to one violation.
    pub async fn issue_for_violation(
        &self,
        tenant_id: Uuid,
        rule: &RuleModel,
        violation: &Violation,
        now: DateTime<Utc>,
    ) -> Result<Issuance, EngineError> {
        let repo = PenaltyRepository::new(&self.db, tenant_id);
        let today = now.date_naive();

        if repo
            .issued_on(rule.id, violation.user_id, violation.related.as_ref(), today)
            .await?
        {
            return Ok(Issuance::Duplicate);
        }

        let valid_warnings = repo
            .count_valid_warnings(violation.user_id, rule.id, now)
            .await?;
        if valid_warnings < rule.warning_threshold.max(0) as u64 {
            let warning = repo
                .insert_warning(penalty_warning::ActiveModel {
                    user_id: Set(violation.user_id),
                    rule_id: Set(rule.id),
                    related_type: Set(violation.related.as_ref().map(|r| r.kind.clone())),
                    related_id: Set(violation.related.as_ref().map(|r| r.id)),
                    issued_on: Set(today),
                    warning_number: Set(valid_warnings as i32 + 1),
                    reason: Set(format!("{}: {}", rule.name, violation.description)),
                    expires_at: Set(now + Duration::days(rule.warning_validity_days as i64)),
                    created_at: Set(now),
                    ..Default::default()
                })
                .await?;
            info!(
                tenant_id = %tenant_id,
                rule = %rule.code,
                user_id = %violation.user_id,
                warning_number = warning.warning_number,
                "Warning issued"
            );
            return Ok(Issuance::Warning(warning));
        }

        if self.limit_reached(&repo, rule, violation.user_id, today).await? {
            debug!(rule = %rule.code, user_id = %violation.user_id, "Penalty limit reached");
            return Ok(Issuance::LimitReached);
        }

        let penalty = repo
            .insert_penalty(self.new_penalty(
                violation.user_id,
                Some(rule.id),
                violation.related.as_ref(),
                format!("{}: {}", rule.name, violation.description),
                rule.penalty_amount,
                None,
                now,
            ))
            .await?;
        info!(
            tenant_id = %tenant_id,
            rule = %rule.code,
            user_id = %violation.user_id,
            amount = penalty.amount,
            "Penalty issued"
        );
        Ok(Issuance::Penalty(penalty))
    }

    async fn limit_reached(
        &self,
        repo: &PenaltyRepository<'_, DatabaseConnection>,
        rule: &RuleModel,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<bool, EngineError> {
        if let Some(limit) = rule.daily_limit {
            let issued = repo
                .count_penalties(user_id, rule.id, DateRange::day(today))
                .await?;
            if issued >= limit.max(0) as u64 {
                return Ok(true);
            }
        }
        if let Some(limit) = rule.monthly_limit {
            let month = PeriodType::Monthly.bounds_for(today).range();
            let issued = repo.count_penalties(user_id, rule.id, month).await?;
            if issued >= limit.max(0) as u64 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    #[allow(clippy::too_many_arguments)]
    fn new_penalty(
        &self,
        user_id: Uuid,
        rule_id: Option<Uuid>,
        related: Option<&RelatedEntity>,
        reason: String,
        amount: f64,
        issued_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> penalty::ActiveModel {
        penalty::ActiveModel {
            user_id: Set(user_id),
            rule_id: Set(rule_id),
            related_type: Set(related.map(|r| r.kind.clone())),
            related_id: Set(related.map(|r| r.id)),
            issued_on: Set(now.date_naive()),
            reason: Set(reason),
            amount: Set(amount),
            status: Set(PenaltyStatus::Pending),
            triggered_at: Set(now),
            appeal_deadline: Set(now + Duration::days(self.config.appeal_window_days)),
            issued_by: Set(issued_by),
            deducted_from_bonus_id: Set(None),
            updated_at: Set(now),
            ..Default::default()
        }
    }

    /// Issue a pending penalty by hand. No escalation or limits apply.
    pub async fn issue_manual(
        &self,
        tenant_id: Uuid,
        request: ManualPenalty,
    ) -> Result<PenaltyModel, EngineError> {
        if request.amount < 0.0 {
            return Err(EngineError::Validation(
                "penalty amount cannot be negative".to_string(),
            ));
        }
        let repo = PenaltyRepository::new(&self.db, tenant_id);
        if let Some(rule_id) = request.rule_id {
            repo.find_rule(rule_id)
                .await?
                .ok_or_else(|| EngineError::not_found("penalty rule", rule_id))?;
        }

        let penalty = repo
            .insert_penalty(self.new_penalty(
                request.user_id,
                request.rule_id,
                request.related.as_ref(),
                request.reason,
                request.amount,
                request.issued_by,
                Utc::now(),
            ))
            .await?;
        info!(
            tenant_id = %tenant_id,
            user_id = %penalty.user_id,
            amount = penalty.amount,
            "Manual penalty issued"
        );
        Ok(penalty)
    }

    async fn load(&self, tenant_id: Uuid, penalty_id: Uuid) -> Result<PenaltyModel, EngineError> {
        PenaltyRepository::new(&self.db, tenant_id)
            .find_penalty(penalty_id)
            .await?
            .ok_or_else(|| EngineError::not_found("penalty", penalty_id))
    }

    /// `pending → confirmed`.
    pub async fn confirm(
        &self,
        tenant_id: Uuid,
        penalty_id: Uuid,
        confirmed_by: Uuid,
    ) -> Result<PenaltyModel, EngineError> {
        let penalty = self.load(tenant_id, penalty_id).await?;
        if !penalty.status.can_confirm() {
            return Err(EngineError::invalid_transition(
                "penalty",
                penalty.status.as_str(),
                "confirm",
            ));
        }

        let now = Utc::now();
        let mut active = penalty.into_active_model();
        active.status = Set(PenaltyStatus::Confirmed);
        active.confirmed_by = Set(Some(confirmed_by));
        active.confirmed_at = Set(Some(now));
        active.updated_at = Set(now);
        Ok(PenaltyRepository::new(&self.db, tenant_id)
            .update_penalty(active)
            .await?)
    }

    /// Appeal a pending or confirmed penalty before its appeal deadline.
    pub async fn submit_appeal(
        &self,
        tenant_id: Uuid,
        penalty_id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<PenaltyModel, EngineError> {
        let penalty = self.load(tenant_id, penalty_id).await?;
        if !penalty.status.can_appeal() {
            return Err(EngineError::invalid_transition(
                "penalty",
                penalty.status.as_str(),
                "appeal",
            ));
        }
        if now > penalty.appeal_deadline {
            return Err(EngineError::invalid_transition(
                "penalty",
                format!(
                    "{} (appeal window closed {})",
                    penalty.status.as_str(),
                    penalty.appeal_deadline.format("%Y-%m-%d %H:%M UTC")
                ),
                "appeal",
            ));
        }
        if reason.trim().is_empty() {
            return Err(EngineError::Validation(
                "appeal reason is required".to_string(),
            ));
        }

        let user_id = penalty.user_id;
        let mut active = penalty.into_active_model();
        active.status = Set(PenaltyStatus::Appealed);
        active.appeal_reason = Set(Some(reason.to_string()));
        active.appealed_at = Set(Some(now));
        active.updated_at = Set(now);
        let updated = PenaltyRepository::new(&self.db, tenant_id)
            .update_penalty(active)
            .await?;
        info!(tenant_id = %tenant_id, penalty_id = %penalty_id, user_id = %user_id, "Penalty appealed");
        Ok(updated)
    }

    /// Decide an appeal. Approval voids the penalty and zeroes its amount;
    /// a bonus it was already deducted from gets its net amount back.
    pub async fn review_appeal(
        &self,
        tenant_id: Uuid,
        penalty_id: Uuid,
        reviewed_by: Uuid,
        approve: bool,
        resolution: Option<String>,
    ) -> Result<PenaltyModel, EngineError> {
        let penalty = self.load(tenant_id, penalty_id).await?;
        if !penalty.status.can_review() {
            return Err(EngineError::invalid_transition(
                "penalty",
                penalty.status.as_str(),
                "review appeal of",
            ));
        }

        let now = Utc::now();
        let mut active = penalty.into_active_model();
        if approve {
            active.status = Set(PenaltyStatus::AppealApproved);
            active.amount = Set(0.0);
        } else {
            active.status = Set(PenaltyStatus::AppealRejected);
        }
        active.reviewed_by = Set(Some(reviewed_by));
        active.reviewed_at = Set(Some(now));
        active.resolution = Set(resolution);
        active.updated_at = Set(now);

        let txn = self.db.begin().await?;
        let updated = PenaltyRepository::new(&txn, tenant_id)
            .update_penalty(active)
            .await?;
        if let Some(bonus_id) = updated.deducted_from_bonus_id.filter(|_| approve) {
            if let Some(calculation) = BonusRepository::new(&txn, tenant_id)
                .find_calculation_by_id(bonus_id)
                .await?
            {
                let refreshed = refresh_net_amount(&txn, tenant_id, calculation).await?;
                info!(
                    bonus_id = %bonus_id,
                    net_amount = refreshed.net_amount,
                    "Bonus deductions refreshed"
                );
            }
        }
        txn.commit().await?;

        info!(
            tenant_id = %tenant_id,
            penalty_id = %penalty_id,
            approved = approve,
            "Penalty appeal reviewed"
        );
        Ok(updated)
    }

    /// Appeals waiting for a decision, oldest first.
    pub async fn awaiting_review(&self, tenant_id: Uuid) -> Result<Vec<PenaltyModel>, EngineError> {
        Ok(PenaltyRepository::new(&self.db, tenant_id)
            .with_status(PenaltyStatus::Appealed)
            .await?)
    }

    /// Penalty and warning totals for the current and previous months.
    pub async fn user_summary(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PenaltySummary, EngineError> {
        let today = now.date_naive();
        let since = today
            .checked_sub_months(Months::new(SUMMARY_MONTHS))
            .and_then(|d| d.with_day(1))
            .unwrap_or(today);
        let repo = PenaltyRepository::new(&self.db, tenant_id);
        let penalties = repo
            .penalties_for_user(user_id, Some(DateRange::new(since, today)))
            .await?;
        let warnings = repo.warnings_for_user(user_id, since).await?;

        Ok(summarize(since, &penalties, &warnings, now))
    }
}

/// Aggregate a user's penalties and warnings.
pub fn summarize(
    since: NaiveDate,
    penalties: &[PenaltyModel],
    warnings: &[WarningModel],
    now: DateTime<Utc>,
) -> PenaltySummary {
    let mut summary = PenaltySummary {
        since: Some(since),
        total_penalties: penalties.len(),
        total_warnings: warnings.len(),
        active_warnings: warnings.iter().filter(|w| w.expires_at > now).count(),
        ..Default::default()
    };
    for penalty in penalties {
        match penalty.status {
            PenaltyStatus::Pending => {
                summary.pending_count += 1;
                summary.pending_amount += penalty.amount;
            }
            PenaltyStatus::Confirmed => {
                summary.confirmed_count += 1;
                summary.confirmed_amount += penalty.amount;
            }
            PenaltyStatus::AppealRejected => {
                summary.appealed_count += 1;
                summary.confirmed_amount += penalty.amount;
            }
            PenaltyStatus::Appealed | PenaltyStatus::AppealApproved => {
                summary.appealed_count += 1;
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn penalty(status: PenaltyStatus, amount: f64) -> PenaltyModel {
        let now = Utc::now();
        PenaltyModel {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            user_id: Uuid::nil(),
            rule_id: None,
            related_type: None,
            related_id: None,
            issued_on: now.date_naive(),
            reason: "late".to_string(),
            amount,
            status,
            triggered_at: now,
            appeal_deadline: now,
            issued_by: None,
            confirmed_by: None,
            confirmed_at: None,
            appeal_reason: None,
            appealed_at: None,
            reviewed_by: None,
            reviewed_at: None,
            resolution: None,
            deducted_from_bonus_id: None,
            updated_at: now,
        }
    }

    fn warning(expires_in_days: i64) -> WarningModel {
        let now = Utc::now();
        WarningModel {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            user_id: Uuid::nil(),
            rule_id: Uuid::nil(),
            related_type: None,
            related_id: None,
            issued_on: now.date_naive(),
            warning_number: 1,
            reason: "late".to_string(),
            expires_at: now + Duration::days(expires_in_days),
            created_at: now,
        }
    }

    #[test]
    fn test_summary_groups_by_status() {
        let now = Utc::now();
        let penalties = vec![
            penalty(PenaltyStatus::Pending, 10.0),
            penalty(PenaltyStatus::Confirmed, 20.0),
            penalty(PenaltyStatus::AppealRejected, 5.0),
            penalty(PenaltyStatus::AppealApproved, 0.0),
        ];
        let warnings = vec![warning(10), warning(-1)];

        let summary = summarize(now.date_naive(), &penalties, &warnings, now);
        assert_eq!(summary.total_penalties, 4);
        assert_eq!(summary.pending_count, 1);
        assert_eq!(summary.pending_amount, 10.0);
        assert_eq!(summary.confirmed_count, 1);
        assert_eq!(summary.confirmed_amount, 25.0);
        assert_eq!(summary.appealed_count, 2);
        assert_eq!(summary.total_warnings, 2);
        assert_eq!(summary.active_warnings, 1);
    }
}
