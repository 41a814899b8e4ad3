//! # Bonus Calculator
//!
//! Turns a user's period summary into a tiered payout for each bonus scheme,
//! drives the payout through `calculated → approved → paid` (or `rejected`),
//! and nets out standing penalties. A penalty is attributed to at most one
//! bonus: the link it carries is the dedup key.

pub mod tiers;

use std::sync::Arc;

use chrono::{DateTime, Months, NaiveDate, Utc};
use metrics::counter;
use sea_orm::{ConnectionTrait, DatabaseConnection, IntoActiveModel, Set, TransactionTrait};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::activity::ActivitySource;
use crate::error::EngineError;
use crate::kpi::KpiCalculator;
use crate::kpi::scoring::round2;
use crate::models::bonus_calculation::{self, BonusStatus, Model as CalculationModel};
use crate::models::bonus_setting::Model as SettingModel;
use crate::models::penalty::Model as PenaltyModel;
use crate::period::{DateRange, Period, PeriodType};
use crate::repositories::{BonusRepository, PenaltyRepository, SnapshotRepository};
use crate::seeds;

pub use tiers::{BonusAmounts, BonusTier, Qualification};

/// Months of history covered by the user summary.
const SUMMARY_MONTHS: u32 = 6;

#[derive(Debug, Default, Clone, Serialize)]
pub struct BonusSweepReport {
    pub settings: usize,
    pub calculated: Vec<CalculationModel>,
    /// Calculations already approved, rejected or paid
    pub locked: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BonusSummary {
    pub since: Option<NaiveDate>,
    pub calculations: usize,
    pub qualified: usize,
    pub pending_amount: f64,
    pub approved_amount: f64,
    pub paid_amount: f64,
    pub total_deductions: f64,
}

#[derive(Clone)]
pub struct BonusCalculator {
    db: DatabaseConnection,
    activity: Arc<dyn ActivitySource>,
    kpi: KpiCalculator,
}

impl BonusCalculator {
    pub fn new(
        db: DatabaseConnection,
        activity: Arc<dyn ActivitySource>,
        kpi: KpiCalculator,
    ) -> Self {
        Self { db, activity, kpi }
    }

    /// Create the default monthly scheme unless one with its name exists.
    pub async fn seed_defaults(&self, tenant_id: Uuid) -> Result<SettingModel, EngineError> {
        let (name, setting) = seeds::default_bonus_setting();
        let created = BonusRepository::new(&self.db, tenant_id)
            .create_setting(setting, name)
            .await?;
        info!(tenant_id = %tenant_id, setting = %created.name, "Seeded default bonus setting");
        Ok(created)
    }

    /// Compute (or recompute) one user's bonus for the period of `setting`
    /// containing `date`. Recomputation is refused once the calculation has
    /// left the `calculated` state; penalties already linked to it stay
    /// deducted.
    #[instrument(skip(self, setting), fields(tenant_id = %tenant_id, setting = %setting.name))]
    pub async fn calculate_user_bonus(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        setting: &SettingModel,
        date: NaiveDate,
        calculated_by: Option<Uuid>,
    ) -> Result<CalculationModel, EngineError> {
        let period = setting.period_type.bounds_for(date);
        let repo = BonusRepository::new(&self.db, tenant_id);
        let existing = repo
            .find_calculation(setting.id, user_id, period.start)
            .await?;
        if let Some(current) = &existing {
            if current.status != BonusStatus::Calculated {
                return Err(EngineError::invalid_transition(
                    "bonus",
                    current.status.as_str(),
                    "recalculate",
                ));
            }
        }

        let summary = SnapshotRepository::new(&self.db, tenant_id)
            .find_summary(user_id, setting.period_type, period.start)
            .await?;
        let (kpi_score, working_days) = match &summary {
            Some(summary) => (summary.overall_score, summary.working_days),
            None => (0, period.working_days()),
        };
        let revenue = self
            .kpi
            .value(tenant_id, user_id, "revenue", period.start, period.end)
            .await?;

        let qualification = tiers::qualify(setting, kpi_score, working_days);
        let amounts = tiers::compute(setting, kpi_score, revenue, qualification.qualified);

        let deductions = match &existing {
            Some(current) => linked_total(
                &PenaltyRepository::new(&self.db, tenant_id)
                    .linked_to_bonus(current.id)
                    .await?,
            ),
            None => 0.0,
        };

        let calculation = bonus_calculation::ActiveModel {
            setting_id: Set(setting.id),
            user_id: Set(user_id),
            period_start: Set(period.start),
            period_end: Set(period.end),
            kpi_score: Set(kpi_score),
            revenue: Set(revenue),
            working_days: Set(working_days),
            is_qualified: Set(qualification.qualified),
            disqualification_reason: Set(qualification.reason.clone()),
            base_amount: Set(amounts.base_amount),
            tier_multiplier: Set(amounts.multiplier),
            applied_tier: Set(amounts.applied_tier.clone()),
            final_amount: Set(amounts.final_amount),
            penalty_deductions: Set(deductions),
            net_amount: Set(tiers::net_amount(amounts.final_amount, deductions)),
            status: Set(BonusStatus::Calculated),
            breakdown: Set(breakdown(setting, &period, &qualification, &amounts)),
            calculated_by: Set(calculated_by),
            calculated_at: Set(Utc::now()),
            approved_by: Set(None),
            approved_at: Set(None),
            rejected_by: Set(None),
            rejection_reason: Set(None),
            paid_at: Set(None),
            payment_reference: Set(None),
            ..Default::default()
        };
        let saved = repo.save_calculation(calculation, existing.as_ref()).await?;
        info!(
            tenant_id = %tenant_id,
            user_id = %user_id,
            kpi_score,
            qualified = saved.is_qualified,
            final_amount = saved.final_amount,
            "Bonus calculated"
        );
        Ok(saved)
    }

    /// Calculate every auto scheme of `period_type` for every team member
    /// whose role it covers. Failures are isolated per user.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn calculate_period(
        &self,
        tenant_id: Uuid,
        period_type: PeriodType,
        date: NaiveDate,
    ) -> Result<BonusSweepReport, EngineError> {
        let settings: Vec<SettingModel> = BonusRepository::new(&self.db, tenant_id)
            .active_settings()
            .await?
            .into_iter()
            .filter(|s| s.auto_calculate && s.period_type == period_type)
            .collect();
        let team = self.activity.sales_team(tenant_id).await?;
        let mut report = BonusSweepReport {
            settings: settings.len(),
            ..Default::default()
        };

        for setting in &settings {
            for member in team.iter().filter(|m| setting.applies_to_role(&m.role)) {
                match self
                    .calculate_user_bonus(tenant_id, member.user_id, setting, date, None)
                    .await
                {
                    Ok(calculation) => report.calculated.push(calculation),
                    Err(EngineError::InvalidTransition { .. }) => report.locked += 1,
                    Err(err) => {
                        report.failed += 1;
                        error!(
                            tenant_id = %tenant_id,
                            user_id = %member.user_id,
                            setting = %setting.name,
                            error = %err,
                            "Failed to calculate bonus"
                        );
                    }
                }
            }
        }

        counter!("bonus_calculations_total").increment(report.calculated.len() as u64);
        info!(
            tenant_id = %tenant_id,
            calculated = report.calculated.len(),
            locked = report.locked,
            failed = report.failed,
            "Bonus sweep completed"
        );
        Ok(report)
    }

    async fn load(
        &self,
        tenant_id: Uuid,
        calculation_id: Uuid,
    ) -> Result<CalculationModel, EngineError> {
        BonusRepository::new(&self.db, tenant_id)
            .find_calculation_by_id(calculation_id)
            .await?
            .ok_or_else(|| EngineError::not_found("bonus", calculation_id))
    }

    /// `calculated → approved`.
    pub async fn approve(
        &self,
        tenant_id: Uuid,
        calculation_id: Uuid,
        approved_by: Uuid,
    ) -> Result<CalculationModel, EngineError> {
        let calculation = self.load(tenant_id, calculation_id).await?;
        if calculation.status != BonusStatus::Calculated {
            return Err(EngineError::invalid_transition(
                "bonus",
                calculation.status.as_str(),
                "approve",
            ));
        }

        let mut active = calculation.into_active_model();
        active.status = Set(BonusStatus::Approved);
        active.approved_by = Set(Some(approved_by));
        active.approved_at = Set(Some(Utc::now()));
        let updated = BonusRepository::new(&self.db, tenant_id)
            .update_calculation(active)
            .await?;
        info!(tenant_id = %tenant_id, bonus_id = %calculation_id, "Bonus approved");
        Ok(updated)
    }

    /// `calculated → rejected`. Rejection is terminal.
    pub async fn reject(
        &self,
        tenant_id: Uuid,
        calculation_id: Uuid,
        rejected_by: Uuid,
        reason: &str,
    ) -> Result<CalculationModel, EngineError> {
        let calculation = self.load(tenant_id, calculation_id).await?;
        if calculation.status != BonusStatus::Calculated {
            return Err(EngineError::invalid_transition(
                "bonus",
                calculation.status.as_str(),
                "reject",
            ));
        }
        if reason.trim().is_empty() {
            return Err(EngineError::Validation(
                "rejection reason is required".to_string(),
            ));
        }

        let mut active = calculation.into_active_model();
        active.status = Set(BonusStatus::Rejected);
        active.rejected_by = Set(Some(rejected_by));
        active.rejection_reason = Set(Some(reason.to_string()));
        let updated = BonusRepository::new(&self.db, tenant_id)
            .update_calculation(active)
            .await?;
        info!(tenant_id = %tenant_id, bonus_id = %calculation_id, "Bonus rejected");
        Ok(updated)
    }

    /// `approved → paid`.
    pub async fn mark_paid(
        &self,
        tenant_id: Uuid,
        calculation_id: Uuid,
        payment_reference: Option<String>,
    ) -> Result<CalculationModel, EngineError> {
        let calculation = self.load(tenant_id, calculation_id).await?;
        if calculation.status != BonusStatus::Approved {
            return Err(EngineError::invalid_transition(
                "bonus",
                calculation.status.as_str(),
                "mark as paid",
            ));
        }

        let mut active = calculation.into_active_model();
        active.status = Set(BonusStatus::Paid);
        active.paid_at = Set(Some(Utc::now()));
        active.payment_reference = Set(payment_reference);
        let updated = BonusRepository::new(&self.db, tenant_id)
            .update_calculation(active)
            .await?;
        info!(tenant_id = %tenant_id, bonus_id = %calculation_id, "Bonus paid");
        Ok(updated)
    }

    /// Attribute the user's standing, unlinked penalties from the bonus period
    /// to this calculation and refresh its net amount. Penalties linked to
    /// another bonus in the meantime are skipped.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub async fn deduct_penalties(
        &self,
        tenant_id: Uuid,
        calculation_id: Uuid,
    ) -> Result<CalculationModel, EngineError> {
        let calculation = self.load(tenant_id, calculation_id).await?;
        if !matches!(
            calculation.status,
            BonusStatus::Calculated | BonusStatus::Approved
        ) {
            return Err(EngineError::invalid_transition(
                "bonus",
                calculation.status.as_str(),
                "deduct penalties from",
            ));
        }
        let range = DateRange::new(calculation.period_start, calculation.period_end);
        let candidates = PenaltyRepository::new(&self.db, tenant_id)
            .deductible(calculation.user_id, range)
            .await?;

        let txn = self.db.begin().await?;
        let penalties = PenaltyRepository::new(&txn, tenant_id);
        let mut linked = 0;
        for penalty in &candidates {
            if penalties.link_to_bonus(penalty.id, calculation.id).await? {
                linked += 1;
            } else {
                warn!(penalty_id = %penalty.id, "Penalty already linked to another bonus");
            }
        }
        let updated = refresh_net_amount(&txn, tenant_id, calculation).await?;
        txn.commit().await?;

        info!(
            tenant_id = %tenant_id,
            bonus_id = %calculation_id,
            linked,
            deductions = updated.penalty_deductions,
            net_amount = updated.net_amount,
            "Penalties deducted from bonus"
        );
        Ok(updated)
    }

    /// Calculations waiting for approval, newest period first.
    pub async fn awaiting_approval(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<CalculationModel>, EngineError> {
        Ok(BonusRepository::new(&self.db, tenant_id)
            .with_status(BonusStatus::Calculated)
            .await?)
    }

    /// Totals over the last six months of calculations.
    pub async fn user_summary(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<BonusSummary, EngineError> {
        let today = now.date_naive();
        let since = today
            .checked_sub_months(Months::new(SUMMARY_MONTHS))
            .unwrap_or(today);
        let calculations: Vec<CalculationModel> = BonusRepository::new(&self.db, tenant_id)
            .calculations_for_user(user_id)
            .await?
            .into_iter()
            .filter(|c| c.period_start >= since)
            .collect();
        Ok(summarize(since, &calculations))
    }
}

pub fn summarize(since: NaiveDate, calculations: &[CalculationModel]) -> BonusSummary {
    let mut summary = BonusSummary {
        since: Some(since),
        calculations: calculations.len(),
        ..Default::default()
    };
    for calculation in calculations {
        if calculation.is_qualified {
            summary.qualified += 1;
        }
        summary.total_deductions += calculation.penalty_deductions;
        match calculation.status {
            BonusStatus::Calculated => summary.pending_amount += calculation.net_amount,
            BonusStatus::Approved => summary.approved_amount += calculation.net_amount,
            BonusStatus::Paid => summary.paid_amount += calculation.net_amount,
            BonusStatus::Rejected => {}
        }
    }
    summary
}

/// Recompute deductions and net amount from the penalties linked to the
/// calculation. Only calculated and approved bonuses change.
pub(crate) async fn refresh_net_amount<C: ConnectionTrait>(
    conn: &C,
    tenant_id: Uuid,
    calculation: CalculationModel,
) -> Result<CalculationModel, EngineError> {
    if !matches!(
        calculation.status,
        BonusStatus::Calculated | BonusStatus::Approved
    ) {
        return Ok(calculation);
    }
    let deductions = linked_total(
        &PenaltyRepository::new(conn, tenant_id)
            .linked_to_bonus(calculation.id)
            .await?,
    );
    let net = tiers::net_amount(calculation.final_amount, deductions);
    if calculation.penalty_deductions == deductions && calculation.net_amount == net {
        return Ok(calculation);
    }
    let mut active = calculation.into_active_model();
    active.penalty_deductions = Set(deductions);
    active.net_amount = Set(net);
    Ok(BonusRepository::new(conn, tenant_id)
        .update_calculation(active)
        .await?)
}

fn linked_total(penalties: &[PenaltyModel]) -> f64 {
    round2(penalties.iter().map(|p| p.amount).sum())
}

fn breakdown(
    setting: &SettingModel,
    period: &Period,
    qualification: &Qualification,
    amounts: &BonusAmounts,
) -> serde_json::Value {
    json!({
        "setting": setting.name,
        "calculation_type": setting.calculation_type,
        "period": {
            "type": period.period_type,
            "start": period.start,
            "end": period.end,
        },
        "requirements": {
            "min_kpi_score": setting.min_kpi_score,
            "min_working_days": setting.min_working_days,
        },
        "qualification": qualification,
        "amounts": amounts,
    })
}
