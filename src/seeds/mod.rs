//! Default tenant configuration
//!
//! Builders for the rows a new tenant starts with: metric catalog, lead
//! scoring rules, achievement definitions, penalty rules and a bonus scheme.
//! The owning components insert them and skip anything that already exists.

use sea_orm::Set;
use serde_json::json;

use crate::models::achievement_definition::{self, TriggerType};
use crate::models::bonus_setting::{self, CalculationType};
use crate::models::lead_scoring_rule;
use crate::models::metric_definition::MetricCategory;
use crate::models::penalty_rule::{self, RuleTriggerType};
use crate::period::PeriodType;
use crate::repositories::metric::NewMetricDefinition;

/// Default metric catalog. Each category's default weight is split evenly
/// across its metrics.
pub fn default_metrics() -> Vec<NewMetricDefinition> {
    // (type, name, category, min, good, excellent, unit, method)
    let rows: [(&str, &str, MetricCategory, f64, f64, f64, &str, &str); 6] = [
        ("leads_converted", "Leads converted", MetricCategory::Result, 5.0, 8.0, 12.0, "count", "count"),
        ("revenue", "Revenue", MetricCategory::Result, 50_000_000.0, 80_000_000.0, 120_000_000.0, "currency", "sum"),
        ("calls_made", "Calls made", MetricCategory::Activity, 100.0, 150.0, 200.0, "count", "count"),
        ("tasks_completed", "Tasks completed", MetricCategory::Activity, 40.0, 60.0, 80.0, "count", "count"),
        ("conversion_rate", "Conversion rate", MetricCategory::Quality, 15.0, 25.0, 35.0, "percent", "ratio"),
        ("crm_compliance", "CRM compliance", MetricCategory::Quality, 80.0, 90.0, 100.0, "percent", "ratio"),
    ];

    rows.iter()
        .enumerate()
        .map(|(index, (metric_type, name, category, min, good, excellent, unit, method))| {
            let siblings = rows.iter().filter(|row| row.2 == *category).count() as i32;
            NewMetricDefinition {
                metric_type: metric_type.to_string(),
                name: name.to_string(),
                category: *category,
                weight: category.default_weight() / siblings.max(1),
                target_min: *min,
                target_good: Some(*good),
                target_excellent: Some(*excellent),
                unit: unit.to_string(),
                calculation_method: method.to_string(),
                period_type: PeriodType::Monthly,
                sort_order: index as i32,
            }
        })
        .collect()
}

pub fn default_lead_rules() -> Vec<lead_scoring_rule::ActiveModel> {
    let rows: [(&str, &str, &str, &str, Option<&str>, i32); 12] = [
        ("Phone number present", "completeness", "phone", "not_null", None, 15),
        ("Email present", "completeness", "email", "not_null", None, 10),
        ("Company name present", "completeness", "company", "not_null", None, 10),
        ("Large deal (50M+)", "value", "estimated_value", "greater_than", Some("50000000"), 20),
        ("Medium deal (10M+)", "value", "estimated_value", "greater_than", Some("10000000"), 10),
        ("Referral source", "source", "source", "equals", Some("referral"), 25),
        ("Organic source", "source", "source", "equals", Some("organic"), 15),
        ("Has activity", "engagement", "activities_count", "greater_than", Some("0"), 15),
        ("Active (3+ activities)", "engagement", "activities_count", "greater_than", Some("2"), 10),
        ("No contact for 3+ days", "negative", "days_without_contact", "greater_than", Some("2"), -10),
        ("No contact for 7+ days", "negative", "days_without_contact", "greater_than", Some("6"), -15),
        ("No contact for 14+ days", "negative", "days_without_contact", "greater_than", Some("13"), -20),
    ];

    rows.iter()
        .enumerate()
        .map(|(index, (name, category, field, operator, value, points))| {
            lead_scoring_rule::ActiveModel {
                name: Set(name.to_string()),
                category: Set(category.to_string()),
                field: Set(field.to_string()),
                operator: Set(operator.to_string()),
                value: Set(value.map(str::to_string)),
                points: Set(*points),
                is_active: Set(true),
                sort_order: Set(index as i32),
                ..Default::default()
            }
        })
        .collect()
}

/// Achievement definitions keyed by code.
pub fn default_achievements() -> Vec<(&'static str, achievement_definition::ActiveModel)> {
    use TriggerType::*;
    // (code, name, description, category, metric, trigger, target, tier, points)
    let rows: [(&'static str, &str, &str, &str, &str, TriggerType, f64, &str, i32); 18] = [
        ("first_sale", "First sale", "Closed your first deal", "sales", "leads_converted", Cumulative, 1.0, "bronze", 50),
        ("big_deal", "Big deal", "Closed a deal worth 50M or more", "sales", "revenue", Threshold, 50_000_000.0, "gold", 300),
        ("deals_10", "Ten deals", "Closed 10 deals", "sales", "leads_converted", Cumulative, 10.0, "bronze", 100),
        ("sales_50", "Fifty deals", "Closed 50 deals", "sales", "leads_converted", Cumulative, 50.0, "silver", 250),
        ("sales_100", "Hundred deals", "Closed 100 deals", "sales", "leads_converted", Milestone, 100.0, "gold", 500),
        ("calls_100", "Caller", "Made 100 calls", "activity", "calls_made", Cumulative, 100.0, "bronze", 100),
        ("calls_1000", "Switchboard", "Made 1000 calls", "activity", "calls_made", Milestone, 1000.0, "gold", 500),
        ("tasks_10", "Getting things done", "Completed 10 tasks", "activity", "tasks_completed", Cumulative, 10.0, "bronze", 30),
        ("tasks_50", "Task master", "Completed 50 tasks", "activity", "tasks_completed", Cumulative, 50.0, "silver", 100),
        ("tasks_100", "Task machine", "Completed 100 tasks", "activity", "tasks_completed", Cumulative, 100.0, "silver", 200),
        ("streak_7", "Week on target", "Hit the daily target 7 days in a row", "streak", "daily_target", Streak, 7.0, "bronze", 100),
        ("streak_30", "Month on target", "Hit the daily target 30 days in a row", "streak", "daily_target", Streak, 30.0, "gold", 500),
        ("streak_100", "Unstoppable", "Hit the daily target 100 days in a row", "streak", "daily_target", Streak, 100.0, "diamond", 2000),
        ("first_gold", "First gold", "Won your first gold medal", "competition", "gold_medals", Cumulative, 1.0, "gold", 300),
        ("champion", "Champion", "Took first place 5 times", "competition", "first_place_count", Cumulative, 5.0, "platinum", 1000),
        ("perfect_day", "Perfect day", "Scored 100 on the daily KPI", "quality", "kpi_score", Threshold, 100.0, "silver", 150),
        // Unlocked by KPI milestone events only; no sweep measures this metric.
        ("kpi_revenue_100", "Revenue target met", "Reached 100% of the revenue target", "kpi", "revenue_target_percent", Threshold, 100.0, "silver", 200),
        ("kpi_revenue_150", "Revenue crushed", "Reached 150% of the revenue target", "kpi", "revenue_target_percent", Threshold, 150.0, "gold", 500),
    ];

    rows.into_iter()
        .map(|(code, name, description, category, metric, trigger, target, tier, points)| {
            let repeatable = matches!(code, "perfect_day" | "streak_7");
            let conditions = match code {
                "champion" => Some(json!({ "min_days_active": 30 })),
                _ => None,
            };
            (
                code,
                achievement_definition::ActiveModel {
                    name: Set(name.to_string()),
                    description: Set(Some(description.to_string())),
                    category: Set(category.to_string()),
                    metric: Set(metric.to_string()),
                    trigger_type: Set(trigger),
                    target_value: Set(target),
                    conditions: Set(conditions),
                    is_repeatable: Set(repeatable),
                    tier: Set(tier.to_string()),
                    points: Set(points),
                    is_active: Set(true),
                    ..Default::default()
                },
            )
        })
        .collect()
}

/// Auto penalty rules keyed by code, each tolerating `warning_threshold`
/// valid warnings before it charges.
pub fn default_penalty_rules(
    warning_threshold: i32,
) -> Vec<(&'static str, penalty_rule::ActiveModel)> {
    let rule = |name: &str,
                category: &str,
                trigger_event: &str,
                conditions: serde_json::Value,
                amount: f64,
                daily_limit: Option<i32>| penalty_rule::ActiveModel {
        name: Set(name.to_string()),
        category: Set(category.to_string()),
        trigger_event: Set(trigger_event.to_string()),
        trigger_type: Set(RuleTriggerType::Auto),
        conditions: Set(Some(conditions)),
        penalty_type: Set("fixed".to_string()),
        penalty_amount: Set(amount),
        warning_threshold: Set(warning_threshold),
        warning_validity_days: Set(30),
        daily_limit: Set(daily_limit),
        monthly_limit: Set(None),
        is_active: Set(true),
        ..Default::default()
    };

    vec![
        (
            "lead_not_contacted_24h",
            rule(
                "Lead not contacted within 24 hours",
                "activity",
                "lead_not_contacted_24h",
                json!({ "hours": 24 }),
                50_000.0,
                Some(3),
            ),
        ),
        (
            "crm_not_filled",
            rule(
                "CRM card incomplete",
                "quality",
                "crm_not_filled",
                json!({ "required_fields": ["name", "phone", "region"], "grace_hours": 24 }),
                25_000.0,
                Some(3),
            ),
        ),
        (
            "task_overdue",
            rule(
                "Task overdue",
                "activity",
                "task_overdue",
                json!({ "overdue_days": 1 }),
                30_000.0,
                None,
            ),
        ),
        (
            "no_activity_24h",
            rule(
                "No activity for 24 hours",
                "discipline",
                "no_activity_24h",
                json!({ "hours": 24 }),
                20_000.0,
                Some(1),
            ),
        ),
    ]
}

/// The monthly KPI bonus with the default tier table.
pub fn default_bonus_setting() -> (&'static str, bonus_setting::ActiveModel) {
    (
        "KPI bonus",
        bonus_setting::ActiveModel {
            period_type: Set(PeriodType::Monthly),
            calculation_type: Set(CalculationType::Fixed),
            base_amount: Set(1_000_000.0),
            revenue_percent: Set(0.0),
            tiers: Set(None),
            min_kpi_score: Set(60),
            min_working_days: Set(15),
            applicable_roles: Set(None),
            auto_calculate: Set(true),
            is_active: Set(true),
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead_scoring::Operator;

    #[test]
    fn test_default_metric_weights_follow_categories() {
        let metrics = default_metrics();
        let total: i32 = metrics.iter().map(|m| m.weight).sum();
        assert_eq!(total, 100);
        let result: i32 = metrics
            .iter()
            .filter(|m| m.category == MetricCategory::Result)
            .map(|m| m.weight)
            .sum();
        assert_eq!(result, 50);
    }

    #[test]
    fn test_default_lead_rules_use_known_operators() {
        for rule in default_lead_rules() {
            let operator = rule.operator.clone().unwrap();
            assert!(operator.parse::<Operator>().is_ok(), "{operator}");
        }
    }

    #[test]
    fn test_orchestrated_achievement_codes_are_seeded() {
        let codes: Vec<_> = default_achievements().into_iter().map(|(c, _)| c).collect();
        for code in ["first_sale", "big_deal", "deals_10", "tasks_10", "tasks_50", "tasks_100"] {
            assert!(codes.contains(&code), "{code}");
        }
    }

    #[test]
    fn test_penalty_rules_carry_threshold() {
        for (_, rule) in default_penalty_rules(2) {
            assert_eq!(rule.warning_threshold.unwrap(), 2);
        }
    }
}
