//! Strategy map from metric type to the function that measures it.
//!
//! Every strategy is a pure function over [`MetricFacts`], the activity
//! facts of one user loaded once per date range.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::activity::OutcomeStages;
use crate::kpi::scoring::{round1, round2};
use crate::models::{crm_call, crm_lead, crm_task};
use crate::period::TimeWindow;

/// Fields a lead must have filled in to count as CRM-compliant.
pub const REQUIRED_LEAD_FIELDS: [&str; 4] = ["name", "phone", "region", "source"];

/// Activity facts of one user for one window.
#[derive(Debug, Clone)]
pub struct MetricFacts {
    pub window: TimeWindow,
    pub stages: OutcomeStages,
    /// Every lead assigned to the user
    pub leads: Vec<crm_lead::Model>,
    /// Calls started inside the window
    pub calls: Vec<crm_call::Model>,
    /// Tasks completed inside the window
    pub completed_tasks: Vec<crm_task::Model>,
}

impl MetricFacts {
    fn won(&self) -> impl Iterator<Item = &crm_lead::Model> {
        self.leads
            .iter()
            .filter(|lead| self.stages.is_won(&lead.status) && self.window.contains(lead.updated_at))
    }

    fn lost(&self) -> impl Iterator<Item = &crm_lead::Model> {
        self.leads.iter().filter(|lead| {
            self.stages.is_lost(&lead.status) && self.window.contains(lead.updated_at)
        })
    }

    fn created(&self) -> impl Iterator<Item = &crm_lead::Model> {
        self.leads
            .iter()
            .filter(|lead| self.window.contains(lead.created_at))
    }
}

pub type MetricFn = fn(&MetricFacts) -> f64;

static STRATEGIES: LazyLock<HashMap<&'static str, MetricFn>> = LazyLock::new(|| {
    let entries: [(&'static str, MetricFn); 15] = [
        ("leads_converted", leads_converted),
        ("revenue", revenue),
        ("deals_count", deals_count),
        ("conversion_rate", conversion_rate),
        ("avg_deal_size", avg_deal_size),
        ("calls_made", calls_made),
        ("calls_answered", calls_answered),
        ("call_duration", call_duration),
        ("tasks_completed", tasks_completed),
        ("meetings_held", meetings_held),
        ("proposals_sent", proposals_sent),
        ("response_time", response_time),
        ("crm_compliance", crm_compliance),
        ("lead_touch_rate", lead_touch_rate),
        ("lost_rate", lost_rate),
    ];
    HashMap::from(entries)
});

/// Strategy for `metric_type`, `None` for unknown types.
pub fn strategy(metric_type: &str) -> Option<MetricFn> {
    STRATEGIES.get(metric_type).copied()
}

/// Every metric type with a strategy.
pub fn known_metric_types() -> Vec<&'static str> {
    let mut types: Vec<_> = STRATEGIES.keys().copied().collect();
    types.sort_unstable();
    types
}

/// Measure `metric_type`; unknown types measure 0.
pub fn measure(metric_type: &str, facts: &MetricFacts) -> f64 {
    strategy(metric_type).map(|f| f(facts)).unwrap_or(0.0)
}

fn leads_converted(facts: &MetricFacts) -> f64 {
    facts.won().count() as f64
}

fn revenue(facts: &MetricFacts) -> f64 {
    round2(facts.won().map(|lead| lead.estimated_value).sum())
}

fn deals_count(facts: &MetricFacts) -> f64 {
    facts.won().filter(|lead| lead.estimated_value > 0.0).count() as f64
}

fn conversion_rate(facts: &MetricFacts) -> f64 {
    let created: Vec<_> = facts.created().collect();
    if created.is_empty() {
        return 0.0;
    }
    let won = created
        .iter()
        .filter(|lead| facts.stages.is_won(&lead.status))
        .count();
    round1(won as f64 / created.len() as f64 * 100.0)
}

fn avg_deal_size(facts: &MetricFacts) -> f64 {
    let deals: Vec<f64> = facts
        .won()
        .map(|lead| lead.estimated_value)
        .filter(|value| *value > 0.0)
        .collect();
    if deals.is_empty() {
        return 0.0;
    }
    round2(deals.iter().sum::<f64>() / deals.len() as f64)
}

fn calls_made(facts: &MetricFacts) -> f64 {
    facts.calls.len() as f64
}

fn calls_answered(facts: &MetricFacts) -> f64 {
    facts.calls.iter().filter(|call| call.connected()).count() as f64
}

/// Minutes spent on calls.
fn call_duration(facts: &MetricFacts) -> f64 {
    let seconds: i64 = facts
        .calls
        .iter()
        .map(|call| call.duration_seconds.max(0) as i64)
        .sum();
    round1(seconds as f64 / 60.0)
}

fn tasks_completed(facts: &MetricFacts) -> f64 {
    facts.completed_tasks.len() as f64
}

fn meetings_held(facts: &MetricFacts) -> f64 {
    completed_of_kind(facts, "meeting")
}

fn proposals_sent(facts: &MetricFacts) -> f64 {
    completed_of_kind(facts, "proposal")
}

fn completed_of_kind(facts: &MetricFacts, kind: &str) -> f64 {
    facts
        .completed_tasks
        .iter()
        .filter(|task| task.kind == kind)
        .count() as f64
}

/// Average hours from lead creation to first response.
fn response_time(facts: &MetricFacts) -> f64 {
    let hours: Vec<f64> = facts
        .created()
        .filter_map(|lead| {
            lead.first_response_at
                .map(|first| (first - lead.created_at).num_minutes().max(0) as f64 / 60.0)
        })
        .collect();
    if hours.is_empty() {
        return 0.0;
    }
    round1(hours.iter().sum::<f64>() / hours.len() as f64)
}

fn crm_compliance(facts: &MetricFacts) -> f64 {
    let created: Vec<_> = facts.created().collect();
    if created.is_empty() {
        return 100.0;
    }
    let compliant = created
        .iter()
        .filter(|lead| missing_fields(lead).is_empty())
        .count();
    round1(compliant as f64 / created.len() as f64 * 100.0)
}

fn lead_touch_rate(facts: &MetricFacts) -> f64 {
    let created: Vec<_> = facts.created().collect();
    if created.is_empty() {
        return 0.0;
    }
    let touched = created
        .iter()
        .filter(|lead| lead.last_contacted_at.is_some())
        .count();
    round1(touched as f64 / created.len() as f64 * 100.0)
}

fn lost_rate(facts: &MetricFacts) -> f64 {
    if facts.stages.lost.is_none() {
        return 0.0;
    }
    let lost = facts.lost().count();
    let closed = lost + facts.won().count();
    if closed == 0 {
        return 0.0;
    }
    round1(lost as f64 / closed as f64 * 100.0)
}

/// Required fields that are empty on `lead`.
pub fn missing_fields(lead: &crm_lead::Model) -> Vec<&'static str> {
    REQUIRED_LEAD_FIELDS
        .iter()
        .copied()
        .filter(|field| !lead_field_filled(lead, field))
        .collect()
}

/// Whether a named text field of the lead holds a non-blank value.
/// Unknown fields count as filled.
pub fn lead_field_filled(lead: &crm_lead::Model, field: &str) -> bool {
    let value = match field {
        "name" => lead.name.as_deref(),
        "phone" => lead.phone.as_deref(),
        "email" => lead.email.as_deref(),
        "company" => lead.company.as_deref(),
        "region" => lead.region.as_deref(),
        "source" => lead.source.as_deref(),
        _ => return true,
    };
    value.is_some_and(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn window() -> TimeWindow {
        TimeWindow {
            from: Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap(),
            until: Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap(),
        }
    }

    fn lead(status: &str, value: f64) -> crm_lead::Model {
        let at = window().from + Duration::hours(9);
        crm_lead::Model {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            assigned_to: Some(Uuid::nil()),
            name: Some("Acme".to_string()),
            phone: Some("+1".to_string()),
            email: None,
            company: None,
            region: Some("north".to_string()),
            source: Some("web".to_string()),
            status: status.to_string(),
            estimated_value: value,
            lost_reason: None,
            activities_count: 0,
            first_response_at: Some(at + Duration::hours(2)),
            last_contacted_at: None,
            created_at: at,
            updated_at: at + Duration::hours(3),
        }
    }

    fn facts(leads: Vec<crm_lead::Model>, stages: OutcomeStages) -> MetricFacts {
        MetricFacts {
            window: window(),
            stages,
            leads,
            calls: Vec::new(),
            completed_tasks: Vec::new(),
        }
    }

    fn stages() -> OutcomeStages {
        OutcomeStages {
            won: Some("won".to_string()),
            lost: Some("lost".to_string()),
        }
    }

    #[test]
    fn test_deal_metrics() {
        let f = facts(
            vec![lead("won", 100.0), lead("won", 300.0), lead("won", 0.0), lead("lost", 50.0)],
            stages(),
        );
        assert_eq!(measure("leads_converted", &f), 3.0);
        assert_eq!(measure("revenue", &f), 400.0);
        assert_eq!(measure("deals_count", &f), 2.0);
        assert_eq!(measure("avg_deal_size", &f), 200.0);
        assert_eq!(measure("conversion_rate", &f), 75.0);
        assert_eq!(measure("lost_rate", &f), 25.0);
        assert_eq!(measure("response_time", &f), 2.0);
    }

    #[test]
    fn test_missing_stages_degrade_to_zero() {
        let f = facts(vec![lead("won", 100.0)], OutcomeStages::default());
        assert_eq!(measure("revenue", &f), 0.0);
        assert_eq!(measure("lost_rate", &f), 0.0);
        assert_eq!(measure("conversion_rate", &f), 0.0);
    }

    #[test]
    fn test_crm_compliance_defaults_to_full_without_leads() {
        let f = facts(Vec::new(), stages());
        assert_eq!(measure("crm_compliance", &f), 100.0);

        let mut incomplete = lead("new", 0.0);
        incomplete.region = Some("  ".to_string());
        assert_eq!(missing_fields(&incomplete), vec!["region"]);
        let f = facts(vec![incomplete, lead("new", 0.0)], stages());
        assert_eq!(measure("crm_compliance", &f), 50.0);
    }

    #[test]
    fn test_unknown_metric_measures_zero() {
        let f = facts(Vec::new(), stages());
        assert!(strategy("bogus").is_none());
        assert_eq!(measure("bogus", &f), 0.0);
        assert_eq!(known_metric_types().len(), 15);
    }
}
