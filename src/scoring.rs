//! Ranks candidate dates from everyone's availability marks.
//!
//! A date scores `(available + 0.5 * maybe) / total_participants`. Only dates
//! with at least one mark are ranked, so a day nobody has answered for is
//! absent rather than scored as zero. Ranking works on integer half-vote
//! weights so the sort never sees float noise.

use crate::availability::AvailabilityStatus;
use crate::db;
use crate::models::Observation;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("failed to load participants: {0}")]
    ParticipantFetch(#[source] sqlx::Error),
    #[error("failed to load availability: {0}")]
    ObservationFetch(#[source] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateScore {
    pub date: NaiveDate,
    pub score: f64,
    pub available_count: u32,
    pub maybe_count: u32,
    pub unavailable_count: u32,
    pub total_participants: u32,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    available: u32,
    maybe: u32,
    unavailable: u32,
}

impl Tally {
    fn record(&mut self, status: AvailabilityStatus) {
        match status {
            AvailabilityStatus::Available => self.available += 1,
            AvailabilityStatus::Maybe => self.maybe += 1,
            AvailabilityStatus::Unavailable => self.unavailable += 1,
        }
    }

    // Score numerator in half-vote units.
    fn weight(&self) -> u32 {
        self.available * 2 + self.maybe
    }
}

/// Two weights count as tied when their scores differ by less than 1/1000.
/// Integer form of `(head - weight) / (2 * total) < 0.001`.
fn near_tie(head: u32, weight: u32, total_participants: u32) -> bool {
    u64::from(head - weight) * 1000 < 2 * u64::from(total_participants)
}

/// Ranks dates best first. Dates scoring within 0.001 of the best date of
/// their run are treated as tied and ordered earliest first.
pub fn score_dates(observations: &[Observation], total_participants: u32) -> Vec<DateScore> {
    if total_participants == 0 {
        return Vec::new();
    }

    let mut tallies: BTreeMap<NaiveDate, Tally> = BTreeMap::new();
    let mut answered = BTreeSet::new();
    for observation in observations {
        tallies
            .entry(observation.date)
            .or_default()
            .record(observation.status);
        answered.insert(observation.participant_id);
    }
    // Everyone who answered is a participant, even if the count lags behind.
    let total_participants =
        total_participants.max(u32::try_from(answered.len()).unwrap_or(u32::MAX));

    let mut ranked: Vec<(NaiveDate, Tally)> = tallies.into_iter().collect();
    ranked.sort_by_key(|(_, tally)| Reverse(tally.weight()));

    let mut start = 0;
    while start < ranked.len() {
        let head = ranked[start].1.weight();
        let end = ranked[start..]
            .iter()
            .position(|(_, tally)| !near_tie(head, tally.weight(), total_participants))
            .map_or(ranked.len(), |offset| start + offset);
        ranked[start..end].sort_by_key(|(date, _)| *date);
        start = end;
    }

    ranked
        .into_iter()
        .map(|(date, tally)| DateScore {
            date,
            score: f64::from(tally.weight()) / (2.0 * f64::from(total_participants)),
            available_count: tally.available,
            maybe_count: tally.maybe,
            unavailable_count: tally.unavailable,
            total_participants,
        })
        .collect()
}

/// Loads an event's marks and participant count from one snapshot, then ranks them.
pub async fn rank_event(pool: &SqlitePool, event_id: i64) -> Result<Vec<DateScore>, ScoringError> {
    let mut tx = pool.begin().await.map_err(ScoringError::ObservationFetch)?;
    let observations = db::event_observations(&mut *tx, event_id)
        .await
        .map_err(ScoringError::ObservationFetch)?;
    let total = db::count_participants(&mut *tx, event_id)
        .await
        .map_err(ScoringError::ParticipantFetch)?;
    tx.commit().await.map_err(ScoringError::ObservationFetch)?;

    let total = u32::try_from(total).unwrap_or(u32::MAX);
    Ok(score_dates(&observations, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use AvailabilityStatus::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn obs(participant_id: i64, date: &str, status: AvailabilityStatus) -> Observation {
        Observation {
            participant_id,
            date: d(date),
            status,
        }
    }

    #[test]
    fn everyone_available_scores_one() {
        let marks = vec![
            obs(1, "2030-03-01", Available),
            obs(2, "2030-03-01", Available),
            obs(3, "2030-03-01", Available),
        ];
        let scores = score_dates(&marks, 3);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].score, 1.0);
        assert_eq!(scores[0].available_count, 3);
        assert_eq!(scores[0].total_participants, 3);
    }

    #[test]
    fn mixed_answers_score_half() {
        let marks = vec![
            obs(1, "2030-03-01", Available),
            obs(2, "2030-03-01", Maybe),
            obs(3, "2030-03-01", Unavailable),
        ];
        let scores = score_dates(&marks, 3);
        assert_eq!(scores[0].score, 0.5);
        assert_eq!(
            (scores[0].available_count, scores[0].maybe_count, scores[0].unavailable_count),
            (1, 1, 1)
        );
    }

    #[test]
    fn unanswered_dates_are_absent() {
        let marks = vec![obs(1, "2030-03-02", Unavailable)];
        let scores = score_dates(&marks, 2);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].date, d("2030-03-02"));
        assert_eq!(scores[0].score, 0.0);
        assert!(scores.iter().all(|s| s.date != d("2030-03-01")));
    }

    #[test]
    fn silent_participants_still_count_in_the_denominator() {
        let marks = vec![obs(1, "2030-03-01", Available)];
        assert_eq!(score_dates(&marks, 4)[0].score, 0.25);
    }

    #[test]
    fn ties_go_to_the_earlier_date() {
        let marks = vec![
            obs(1, "2030-03-05", Available),
            obs(2, "2030-03-05", Maybe),
            obs(1, "2030-03-02", Maybe),
            obs(2, "2030-03-02", Available),
            obs(1, "2030-03-09", Available),
            obs(2, "2030-03-09", Available),
        ];
        let dates: Vec<_> = score_dates(&marks, 2).into_iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![d("2030-03-09"), d("2030-03-02"), d("2030-03-05")]);
    }

    #[test]
    fn two_maybes_tie_with_one_available() {
        let marks = vec![
            obs(1, "2030-03-04", Maybe),
            obs(2, "2030-03-04", Maybe),
            obs(1, "2030-03-03", Available),
        ];
        let scores = score_dates(&marks, 2);
        assert_eq!(scores[0].date, d("2030-03-03"));
        assert!((scores[0].score - scores[1].score).abs() < 0.001);
    }

    #[test]
    fn near_ties_in_large_events_prefer_the_earlier_date() {
        let mut marks: Vec<_> = (1..=5).map(|p| obs(p, "2030-03-01", Available)).collect();
        marks.extend((1..=5).map(|p| obs(p, "2030-03-02", Available)));
        marks.push(obs(6, "2030-03-02", Maybe));

        let scores = score_dates(&marks, 600);
        assert!(scores[1].score - scores[0].score < 0.001);
        assert_eq!(scores[0].date, d("2030-03-01"));
        assert_eq!(scores[1].date, d("2030-03-02"));
    }

    #[test]
    fn gaps_of_a_thousandth_or_more_keep_score_order() {
        // 0.501 vs 0.5: exactly on the tolerance, not a tie.
        let mut marks: Vec<_> = (1..=250).map(|p| obs(p, "2030-03-01", Available)).collect();
        marks.extend((1..=250).map(|p| obs(p, "2030-03-02", Available)));
        marks.push(obs(251, "2030-03-02", Maybe));

        let dates: Vec<_> = score_dates(&marks, 500).into_iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![d("2030-03-02"), d("2030-03-01")]);
    }

    #[test]
    fn stale_participant_counts_never_push_scores_past_one() {
        let marks = vec![
            obs(1, "2030-03-01", Available),
            obs(2, "2030-03-01", Available),
        ];
        let scores = score_dates(&marks, 1);
        assert_eq!(scores[0].total_participants, 2);
        assert_eq!(scores[0].score, 1.0);
    }

    #[test]
    fn empty_inputs_give_empty_results() {
        assert!(score_dates(&[], 5).is_empty());
        assert!(score_dates(&[obs(1, "2030-03-01", Available)], 0).is_empty());
    }

    #[test]
    fn scoring_is_repeatable() {
        let marks = vec![
            obs(1, "2030-03-01", Maybe),
            obs(2, "2030-03-02", Available),
        ];
        assert_eq!(score_dates(&marks, 2), score_dates(&marks, 2));
    }
}
