//! Rule operators and evaluation of a lead against the rule set.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::EngineError;
use crate::models::crm_lead;
use crate::models::lead_scoring_rule::Model as RuleModel;

/// Score every lead starts from before rules apply.
pub const BASE_SCORE: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    NotNull,
    IsNull,
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::NotNull => "not_null",
            Operator::IsNull => "is_null",
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::GreaterOrEqual => "greater_or_equal",
            Operator::LessOrEqual => "less_or_equal",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
        }
    }

    /// Whether `field` satisfies the operator against `operand`.
    pub fn matches(&self, field: &FieldValue, operand: Option<&str>) -> bool {
        let operand_number = operand.and_then(|o| o.trim().parse::<f64>().ok());
        match self {
            Operator::NotNull => !field.is_missing(),
            Operator::IsNull => field.is_missing(),
            Operator::Equals => field.equals(operand, operand_number),
            Operator::NotEquals => !field.equals(operand, operand_number),
            Operator::GreaterThan => compare(field, operand_number, |a, b| a > b),
            Operator::LessThan => compare(field, operand_number, |a, b| a < b),
            Operator::GreaterOrEqual => compare(field, operand_number, |a, b| a >= b),
            Operator::LessOrEqual => compare(field, operand_number, |a, b| a <= b),
            Operator::Contains => text(field, |t| t.contains(operand.unwrap_or(""))),
            Operator::NotContains => text(field, |t| !t.contains(operand.unwrap_or(""))),
            Operator::StartsWith => text(field, |t| t.starts_with(operand.unwrap_or(""))),
            Operator::EndsWith => text(field, |t| t.ends_with(operand.unwrap_or(""))),
        }
    }
}

fn compare(field: &FieldValue, operand: Option<f64>, op: fn(f64, f64) -> bool) -> bool {
    match (field, operand) {
        (FieldValue::Number(value), Some(operand)) => op(*value, operand),
        _ => false,
    }
}

fn text(field: &FieldValue, check: impl Fn(&str) -> bool) -> bool {
    match field {
        FieldValue::Text(value) => check(value),
        _ => false,
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "not_null" => Operator::NotNull,
            "is_null" => Operator::IsNull,
            "equals" => Operator::Equals,
            "not_equals" => Operator::NotEquals,
            "greater_than" => Operator::GreaterThan,
            "less_than" => Operator::LessThan,
            "greater_or_equal" => Operator::GreaterOrEqual,
            "less_or_equal" => Operator::LessOrEqual,
            "contains" => Operator::Contains,
            "not_contains" => Operator::NotContains,
            "starts_with" => Operator::StartsWith,
            "ends_with" => Operator::EndsWith,
            other => {
                return Err(EngineError::Validation(format!(
                    "unknown scoring operator '{other}'"
                )));
            }
        })
    }
}

/// A lead attribute as seen by the rules.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Missing,
    Text(String),
    Number(f64),
}

impl FieldValue {
    fn is_missing(&self) -> bool {
        match self {
            FieldValue::Missing => true,
            FieldValue::Text(value) => value.trim().is_empty(),
            FieldValue::Number(_) => false,
        }
    }

    fn equals(&self, operand: Option<&str>, operand_number: Option<f64>) -> bool {
        match (self, operand) {
            (FieldValue::Number(value), _) => operand_number == Some(*value),
            (FieldValue::Text(value), Some(operand)) => value == operand,
            (FieldValue::Missing, None) => true,
            _ => false,
        }
    }
}

fn text_field(value: &Option<String>) -> FieldValue {
    match value {
        Some(v) => FieldValue::Text(v.clone()),
        None => FieldValue::Missing,
    }
}

/// Read `field` from a lead. Unknown fields read as missing.
pub fn field_value(lead: &crm_lead::Model, field: &str, now: DateTime<Utc>) -> FieldValue {
    match field {
        "name" => text_field(&lead.name),
        "phone" => text_field(&lead.phone),
        "email" => text_field(&lead.email),
        "company" => text_field(&lead.company),
        "region" => text_field(&lead.region),
        "source" => text_field(&lead.source),
        "lost_reason" => text_field(&lead.lost_reason),
        "status" => FieldValue::Text(lead.status.clone()),
        "estimated_value" => FieldValue::Number(lead.estimated_value),
        "activities_count" => FieldValue::Number(lead.activities_count as f64),
        "days_without_contact" => {
            let since = lead.last_contacted_at.unwrap_or(lead.created_at);
            FieldValue::Number((now - since).num_days().max(0) as f64)
        }
        _ => FieldValue::Missing,
    }
}

/// Points one rule contributes; rules with an unknown operator contribute 0.
pub fn evaluate(rule: &RuleModel, lead: &crm_lead::Model, now: DateTime<Utc>) -> i32 {
    let Ok(operator) = rule.operator.parse::<Operator>() else {
        return 0;
    };
    let value = field_value(lead, &rule.field, now);
    if operator.matches(&value, rule.value.as_deref()) {
        rule.points
    } else {
        0
    }
}

/// One rule's line in a score breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOutcome {
    pub rule: String,
    pub category: String,
    pub points_possible: i32,
    pub points_earned: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreCard {
    pub score: i32,
    pub breakdown: Vec<RuleOutcome>,
}

/// Base score plus every matching rule, clamped to 0-100.
pub fn score_lead(rules: &[RuleModel], lead: &crm_lead::Model, now: DateTime<Utc>) -> ScoreCard {
    let breakdown: Vec<RuleOutcome> = rules
        .iter()
        .map(|rule| RuleOutcome {
            rule: rule.name.clone(),
            category: rule.category.clone(),
            points_possible: rule.points,
            points_earned: evaluate(rule, lead, now),
        })
        .collect();
    let total: i32 = BASE_SCORE + breakdown.iter().map(|o| o.points_earned).sum::<i32>();
    ScoreCard {
        score: total.clamp(0, 100),
        breakdown,
    }
}

/// A positive rule the lead does not meet yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub rule: String,
    pub potential_points: i32,
    pub suggestion: String,
    pub priority: &'static str,
}

/// Up to five unmet positive rules, biggest gain first.
pub fn recommendations(
    rules: &[RuleModel],
    lead: &crm_lead::Model,
    now: DateTime<Utc>,
) -> Vec<Recommendation> {
    let mut unmet: Vec<Recommendation> = rules
        .iter()
        .filter(|rule| rule.points > 0 && evaluate(rule, lead, now) == 0)
        .map(|rule| Recommendation {
            rule: rule.name.clone(),
            potential_points: rule.points,
            suggestion: suggestion_for(rule),
            priority: match rule.points {
                p if p >= 15 => "high",
                p if p >= 10 => "medium",
                _ => "low",
            },
        })
        .collect();
    unmet.sort_by(|a, b| b.potential_points.cmp(&a.potential_points));
    unmet.truncate(5);
    unmet
}

fn suggestion_for(rule: &RuleModel) -> String {
    match rule.field.as_str() {
        "phone" => "Add a phone number".to_string(),
        "email" => "Add an email address".to_string(),
        "company" => "Add the company name".to_string(),
        "estimated_value" => "Enter an estimated deal value".to_string(),
        "activities_count" => "Log an activity with the lead (call, meeting)".to_string(),
        _ => format!("Meet the condition: {}", rule.name),
    }
}
