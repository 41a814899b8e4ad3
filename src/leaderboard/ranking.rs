//! Competition ranking, medals and record comparison.

use std::cmp::Ordering;

use uuid::Uuid;

use crate::models::leaderboard_entry::Medal;
use crate::period::PeriodType;

/// Standard competition ("1224") ranking, best score first.
///
/// Equal scores share a rank and the next distinct score skips the tied
/// places. Scores are compared at two decimals. Ties are listed by user id
/// so the output order is deterministic.
pub fn competition_ranks(scores: &[(Uuid, f64)]) -> Vec<(Uuid, i32)> {
    let mut sorted: Vec<(Uuid, i64)> = scores
        .iter()
        .map(|(user, score)| (*user, (score * 100.0).round() as i64))
        .collect();
    sorted.sort_by(|a, b| match b.1.cmp(&a.1) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });

    let mut ranked = Vec::with_capacity(sorted.len());
    let mut current_rank = 0;
    let mut previous_score = None;
    for (position, (user, score)) in sorted.into_iter().enumerate() {
        if previous_score != Some(score) {
            current_rank = position as i32 + 1;
            previous_score = Some(score);
        }
        ranked.push((user, current_rank));
    }
    ranked
}

/// Places climbed since the previous period; positive is better.
pub fn rank_change(previous_rank: Option<i32>, rank: i32) -> i32 {
    previous_rank.map(|previous| previous - rank).unwrap_or(0)
}

/// Podium medal, only on weekly and monthly boards.
pub fn medal_for(period_type: PeriodType, rank: i32) -> Option<Medal> {
    if period_type.awards_medals() {
        Medal::for_rank(rank)
    } else {
        None
    }
}

/// A candidate replaces a record only when it is strictly greater.
pub fn beats_record(candidate: f64, current: Option<f64>) -> bool {
    match current {
        Some(best) => candidate > best,
        None => candidate > 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users(n: usize) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = (0..n).map(|_| Uuid::new_v4()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_ties_share_rank_and_skip_places() {
        let u = users(5);
        let ranked = competition_ranks(&[
            (u[0], 70.0),
            (u[1], 90.0),
            (u[2], 90.0),
            (u[3], 50.0),
            (u[4], 70.0),
        ]);
        let ranks: Vec<i32> = ranked.iter().map(|(_, r)| *r).collect();
        assert_eq!(ranks, vec![1, 1, 3, 3, 5]);
        assert_eq!(ranked[0].0, u[1]);
        assert_eq!(ranked[4].0, u[3]);
    }

    #[test]
    fn test_block_of_k_ties_is_followed_by_rank_r_plus_k() {
        let u = users(4);
        let ranked = competition_ranks(&[(u[0], 80.0), (u[1], 60.0), (u[2], 60.0), (u[3], 60.0)]);
        let ranks: Vec<i32> = ranked.iter().map(|(_, r)| *r).collect();
        assert_eq!(ranks, vec![1, 2, 2, 2]);

        let u = users(3);
        let ranked = competition_ranks(&[(u[0], 10.0), (u[1], 10.0), (u[2], 10.0)]);
        assert!(ranked.iter().all(|(_, r)| *r == 1));
        assert!(competition_ranks(&[]).is_empty());
    }

    #[test]
    fn test_float_noise_does_not_break_ties() {
        let u = users(2);
        let ranked = competition_ranks(&[(u[0], 0.1 + 0.2), (u[1], 0.3)]);
        assert_eq!(ranked[0].1, ranked[1].1);
    }

    #[test]
    fn test_rank_change_and_medals() {
        assert_eq!(rank_change(Some(5), 2), 3);
        assert_eq!(rank_change(Some(1), 4), -3);
        assert_eq!(rank_change(None, 1), 0);

        assert_eq!(medal_for(PeriodType::Weekly, 1), Some(Medal::Gold));
        assert_eq!(medal_for(PeriodType::Monthly, 3), Some(Medal::Bronze));
        assert_eq!(medal_for(PeriodType::Monthly, 4), None);
        assert_eq!(medal_for(PeriodType::Daily, 1), None);
    }

    #[test]
    fn test_records_need_a_strictly_greater_value() {
        assert!(beats_record(10.0, None));
        assert!(!beats_record(0.0, None));
        assert!(beats_record(10.5, Some(10.0)));
        assert!(!beats_record(10.0, Some(10.0)));
        assert!(!beats_record(9.0, Some(10.0)));
    }
}
