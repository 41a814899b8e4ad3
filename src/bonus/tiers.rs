//! Qualification, tier selection and payout arithmetic for bonus schemes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kpi::scoring::round2;
use crate::models::bonus_setting::{CalculationType, Model as SettingModel};

/// One row of a scheme's tier table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusTier {
    pub min_score: i32,
    pub multiplier: f64,
    #[serde(default)]
    pub name: String,
}

impl BonusTier {
    fn new(min_score: i32, multiplier: f64, name: &str) -> Self {
        Self {
            min_score,
            multiplier,
            name: name.to_string(),
        }
    }
}

/// Tier table used when a scheme does not carry its own.
pub fn default_tiers() -> Vec<BonusTier> {
    vec![
        BonusTier::new(150, 2.0, "Outstanding"),
        BonusTier::new(120, 1.5, "Excellent"),
        BonusTier::new(100, 1.2, "Target met"),
        BonusTier::new(80, 1.0, "Good"),
        BonusTier::new(60, 0.75, "Fair"),
        BonusTier::new(0, 0.5, "Minimum"),
    ]
}

/// Parse a stored tier table, falling back to the defaults when it is
/// missing, empty or malformed.
pub fn parse_tiers(raw: Option<&Value>) -> Vec<BonusTier> {
    let parsed = raw
        .cloned()
        .and_then(|value| serde_json::from_value::<Vec<BonusTier>>(value).ok())
        .filter(|tiers| !tiers.is_empty());
    let mut tiers = parsed.unwrap_or_else(default_tiers);
    tiers.sort_by(|a, b| b.min_score.cmp(&a.min_score));
    tiers
}

/// Highest tier whose `min_score` the score reaches.
pub fn tier_for(tiers: &[BonusTier], kpi_score: i32) -> Option<&BonusTier> {
    tiers
        .iter()
        .filter(|tier| kpi_score >= tier.min_score)
        .max_by_key(|tier| tier.min_score)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Qualification {
    pub qualified: bool,
    pub reason: Option<String>,
}

pub fn qualify(setting: &SettingModel, kpi_score: i32, working_days: i32) -> Qualification {
    if kpi_score < setting.min_kpi_score {
        return Qualification {
            qualified: false,
            reason: Some(format!(
                "KPI score {kpi_score} is below the required {}",
                setting.min_kpi_score
            )),
        };
    }
    if working_days < setting.min_working_days {
        return Qualification {
            qualified: false,
            reason: Some(format!(
                "{working_days} working days is below the required {}",
                setting.min_working_days
            )),
        };
    }
    Qualification {
        qualified: true,
        reason: None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BonusAmounts {
    pub base_amount: f64,
    pub multiplier: f64,
    pub applied_tier: Option<String>,
    pub final_amount: f64,
}

/// Base amount, tier multiplier and final payout. Unqualified users get a
/// zero payout with multiplier 1.
pub fn compute(setting: &SettingModel, kpi_score: i32, revenue: f64, qualified: bool) -> BonusAmounts {
    let base_amount = match setting.calculation_type {
        CalculationType::Fixed => setting.base_amount,
        CalculationType::RevenuePercent => round2(revenue * setting.revenue_percent / 100.0),
    };

    if !qualified {
        return BonusAmounts {
            base_amount,
            multiplier: 1.0,
            applied_tier: None,
            final_amount: 0.0,
        };
    }

    let tiers = parse_tiers(setting.tiers.as_ref());
    let (multiplier, applied_tier) = match tier_for(&tiers, kpi_score) {
        Some(tier) => (tier.multiplier, Some(tier.name.clone())),
        None => (1.0, None),
    };

    BonusAmounts {
        base_amount,
        multiplier,
        applied_tier,
        final_amount: round2(base_amount * multiplier),
    }
}

pub fn net_amount(final_amount: f64, deductions: f64) -> f64 {
    round2((final_amount - deductions).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::PeriodType;
    use serde_json::json;
    use uuid::Uuid;

    fn setting(calculation_type: CalculationType) -> SettingModel {
        SettingModel {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Monthly".to_string(),
            period_type: PeriodType::Monthly,
            calculation_type,
            base_amount: 2_000_000.0,
            revenue_percent: 1.5,
            tiers: None,
            min_kpi_score: 60,
            min_working_days: 15,
            applicable_roles: None,
            auto_calculate: true,
            is_active: true,
        }
    }

    #[test]
    fn test_unqualified_bonus_is_zero() {
        let s = setting(CalculationType::Fixed);
        let q = qualify(&s, 45, 20);
        assert!(!q.qualified);
        assert!(q.reason.unwrap().contains("45"));

        let amounts = compute(&s, 45, 0.0, q.qualified);
        assert_eq!(amounts.final_amount, 0.0);
        assert_eq!(amounts.multiplier, 1.0);
        assert_eq!(amounts.applied_tier, None);
    }

    #[test]
    fn test_working_days_gate() {
        let q = qualify(&setting(CalculationType::Fixed), 90, 10);
        assert!(!q.qualified);
        assert!(q.reason.unwrap().contains("working days"));
    }

    #[test]
    fn test_default_tier_selection() {
        let s = setting(CalculationType::Fixed);
        let amounts = compute(&s, 125, 0.0, true);
        assert_eq!(amounts.multiplier, 1.5);
        assert_eq!(amounts.final_amount, 3_000_000.0);

        assert_eq!(compute(&s, 60, 0.0, true).multiplier, 0.75);
    }

    #[test]
    fn test_revenue_percent_base() {
        let s = setting(CalculationType::RevenuePercent);
        let amounts = compute(&s, 100, 40_000_000.0, true);
        assert_eq!(amounts.base_amount, 600_000.0);
        assert_eq!(amounts.final_amount, 720_000.0);
    }

    #[test]
    fn test_custom_tiers_without_match_use_multiplier_one() {
        let mut s = setting(CalculationType::Fixed);
        s.tiers = Some(json!([{ "min_score": 90, "multiplier": 1.3, "name": "Top" }]));
        let amounts = compute(&s, 70, 0.0, true);
        assert_eq!(amounts.multiplier, 1.0);
        assert_eq!(amounts.applied_tier, None);
        assert_eq!(amounts.final_amount, 2_000_000.0);
    }

    #[test]
    fn test_malformed_tiers_fall_back_to_defaults() {
        let tiers = parse_tiers(Some(&json!({"oops": true})));
        assert_eq!(tiers, default_tiers());
    }

    #[test]
    fn test_net_amount_never_negative() {
        assert_eq!(net_amount(100.0, 250.0), 0.0);
        assert_eq!(net_amount(1000.0, 250.5), 749.5);
    }
}
