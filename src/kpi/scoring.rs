//! Pure score arithmetic shared by snapshots and summaries.

use crate::models::metric_definition::TargetThresholds;
use crate::models::period_summary::MetricScore;

/// Map an actual value onto 0-100 using the metric's control points.
///
/// Piecewise linear through `(0, 0)`, `(min, 50)`, `(good, 75)` and
/// `(excellent, 100)`, extrapolating the last segment and clamping the
/// result to `[0, 100]`. Missing `good` / `excellent` points collapse the
/// curve onto the points that exist. A metric without a positive minimum
/// target scores 0.
pub fn score_for(actual: f64, thresholds: &TargetThresholds) -> i32 {
    if thresholds.min <= 0.0 {
        return 0;
    }
    let mut points: Vec<(f64, f64)> = vec![(0.0, 0.0), (thresholds.min, 50.0)];
    if let Some(good) = thresholds.good.filter(|g| *g > thresholds.min) {
        points.push((good, 75.0));
    }
    if let Some(excellent) = thresholds
        .excellent
        .filter(|e| *e > thresholds.good.unwrap_or(thresholds.min) && *e > thresholds.min)
    {
        points.push((excellent, 100.0));
    }

    let segment = points
        .windows(2)
        .find(|pair| actual <= pair[1].0)
        .unwrap_or(&points[points.len() - 2..]);
    let (x0, y0) = segment[0];
    let (x1, y1) = segment[1];
    let raw = y0 + (actual - x0) / (x1 - x0) * (y1 - y0);

    raw.clamp(0.0, 100.0).round() as i32
}

/// `actual / target` as a percentage with one decimal; 0 without a target.
pub fn achievement_percent(actual: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    round1(actual / target * 100.0)
}

/// Weighted overall score renormalised by the total weight present.
pub fn overall_score(lines: &[MetricScore]) -> (i32, i32) {
    let total_weight: i32 = lines.iter().map(|line| line.weight).sum();
    if total_weight <= 0 {
        return (0, total_weight);
    }
    let weighted: f64 = lines
        .iter()
        .map(|line| line.score as f64 * line.weight as f64 / 100.0)
        .sum();
    let overall = (weighted / (total_weight as f64 / 100.0)).round();
    (overall.clamp(0.0, 100.0) as i32, total_weight)
}

/// `Σ score × weight / 100` without renormalisation; the leaderboard sort key.
pub fn weighted_score(lines: &[MetricScore]) -> f64 {
    round2(
        lines
            .iter()
            .map(|line| line.score as f64 * line.weight as f64 / 100.0)
            .sum(),
    )
}

pub fn performance_tier(overall: i32) -> &'static str {
    match overall {
        s if s >= 90 => "top_performer",
        s if s >= 75 => "high_performer",
        s if s >= 50 => "on_track",
        s if s >= 30 => "needs_attention",
        _ => "critical",
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn thresholds(min: f64, good: f64, excellent: f64) -> TargetThresholds {
        TargetThresholds {
            min,
            good: Some(good),
            excellent: Some(excellent),
        }
    }

    fn line(score: i32, weight: i32) -> MetricScore {
        MetricScore {
            metric_id: Uuid::new_v4(),
            metric_type: "revenue".to_string(),
            weight,
            avg_actual: 0.0,
            avg_target: 0.0,
            avg_achievement_percent: 0.0,
            score,
            days: 1,
        }
    }

    #[test]
    fn test_revenue_example_scores_sixty() {
        let t = thresholds(100.0, 150.0, 200.0);
        assert_eq!(score_for(120.0, &t), 60);
        assert_eq!(achievement_percent(120.0, 100.0), 120.0);
        assert_eq!(60.0 * 30.0 / 100.0, 18.0);
    }

    #[test]
    fn test_control_points_and_clamping() {
        let t = thresholds(100.0, 150.0, 200.0);
        assert_eq!(score_for(0.0, &t), 0);
        assert_eq!(score_for(50.0, &t), 25);
        assert_eq!(score_for(100.0, &t), 50);
        assert_eq!(score_for(150.0, &t), 75);
        assert_eq!(score_for(200.0, &t), 100);
        assert_eq!(score_for(400.0, &t), 100);
        assert_eq!(score_for(-10.0, &t), 0);
    }

    #[test]
    fn test_score_is_monotonic() {
        let t = thresholds(10.0, 15.0, 25.0);
        let mut last = 0;
        for step in 0..60 {
            let score = score_for(step as f64 * 0.5, &t);
            assert!(score >= last);
            last = score;
        }
    }

    #[test]
    fn test_missing_upper_points_extrapolate_from_min() {
        let t = TargetThresholds {
            min: 10.0,
            good: None,
            excellent: None,
        };
        assert_eq!(score_for(10.0, &t), 50);
        assert_eq!(score_for(15.0, &t), 75);
        assert_eq!(score_for(30.0, &t), 100);
    }

    #[test]
    fn test_metric_without_minimum_target_scores_zero() {
        let t = thresholds(0.0, 10.0, 20.0);
        assert_eq!(score_for(15.0, &t), 0);
    }

    #[test]
    fn test_zero_target_gives_zero_percent() {
        assert_eq!(achievement_percent(5.0, 0.0), 0.0);
        assert_eq!(achievement_percent(1.0, 3.0), 33.3);
    }

    #[test]
    fn test_overall_score_is_renormalised_by_total_weight() {
        // Weights sum to 60, so the 60-weighted average is scaled back to 100
        let (overall, total) = overall_score(&[line(80, 30), line(40, 30)]);
        assert_eq!(total, 60);
        assert_eq!(overall, 60);

        let (overall, total) = overall_score(&[line(100, 50), line(50, 50)]);
        assert_eq!(total, 100);
        assert_eq!(overall, 75);
        assert_eq!(overall_score(&[]), (0, 0));
    }

    #[test]
    fn test_performance_tiers() {
        assert_eq!(performance_tier(95), "top_performer");
        assert_eq!(performance_tier(75), "high_performer");
        assert_eq!(performance_tier(50), "on_track");
        assert_eq!(performance_tier(30), "needs_attention");
        assert_eq!(performance_tier(29), "critical");
    }
}
