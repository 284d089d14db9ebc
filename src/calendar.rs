//! Inclusive calendar-day ranges: generation, length and the creation policy.

use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("end date {end} is before start date {start}")]
    Reversed { start: NaiveDate, end: NaiveDate },
    #[error("start must precede end")]
    StartNotBeforeEnd,
    #[error("start date {start} is in the past")]
    StartInPast { start: NaiveDate },
    #[error("date range cannot exceed {max} days (requested {actual} days)")]
    TooLong { max: i64, actual: i64 },
}

/// Non-fatal outcome of [`validate`]: the range is accepted but unusually long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeWarning {
    pub length: i64,
    pub threshold: i64,
}

impl fmt::Display for RangeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "this range spans {} days; ranges over {} days are harder to agree on",
            self.length, self.threshold
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePolicy {
    pub max_days: i64,
    pub warn_days: i64,
}

impl Default for RangePolicy {
    fn default() -> Self {
        Self {
            max_days: 90,
            warn_days: 30,
        }
    }
}

/// Every day from `start` to `end`, both included, ascending.
pub fn generate_sequence(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, RangeError> {
    if end < start {
        return Err(RangeError::Reversed { start, end });
    }
    Ok(start.iter_days().take_while(|d| d <= &end).collect())
}

/// Inclusive day count; a same-day range has length 1.
pub fn length(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

pub fn contains(date: NaiveDate, start: NaiveDate, end: NaiveDate) -> bool {
    start <= date && date <= end
}

/// Checks a proposed event span. `Ok(Some(_))` accepts the range with a warning.
pub fn validate(
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
    policy: &RangePolicy,
) -> Result<Option<RangeWarning>, RangeError> {
    if start >= end {
        return Err(RangeError::StartNotBeforeEnd);
    }
    if start < today {
        return Err(RangeError::StartInPast { start });
    }
    let actual = length(start, end);
    if actual > policy.max_days {
        return Err(RangeError::TooLong {
            max: policy.max_days,
            actual,
        });
    }
    if actual > policy.warn_days {
        return Ok(Some(RangeWarning {
            length: actual,
            threshold: policy.warn_days,
        }));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn same_day_has_length_one() {
        let day = d("2030-02-28");
        assert_eq!(length(day, day), 1);
        assert_eq!(generate_sequence(day, day).unwrap(), vec![day]);
    }

    #[test]
    fn sequence_is_gapless_and_ascending() {
        let (start, end) = (d("2030-02-25"), d("2030-03-03"));
        let days = generate_sequence(start, end).unwrap();
        assert_eq!(days.len() as i64, length(start, end));
        assert_eq!(days.first(), Some(&start));
        assert_eq!(days.last(), Some(&end));
        for pair in days.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::days(1));
        }
    }

    #[test]
    fn reversed_sequence_is_an_error() {
        let err = generate_sequence(d("2030-03-02"), d("2030-03-01")).unwrap_err();
        assert!(matches!(err, RangeError::Reversed { .. }));
    }

    #[test]
    fn contains_is_inclusive() {
        let (start, end) = (d("2030-01-10"), d("2030-01-20"));
        assert!(contains(start, start, end));
        assert!(contains(end, start, end));
        assert!(contains(d("2030-01-15"), start, end));
        assert!(!contains(d("2030-01-09"), start, end));
        assert!(!contains(d("2030-01-21"), start, end));
    }

    #[test]
    fn equal_and_reversed_bounds_fail_identically() {
        let today = d("2030-01-01");
        let policy = RangePolicy::default();
        let equal = validate(d("2030-01-05"), d("2030-01-05"), today, &policy).unwrap_err();
        let reversed = validate(d("2030-01-06"), d("2030-01-05"), today, &policy).unwrap_err();
        assert_eq!(equal, reversed);
        assert_eq!(equal.to_string(), "start must precede end");
    }

    #[test]
    fn past_start_is_rejected_but_today_is_fine() {
        let today = d("2030-01-10");
        let policy = RangePolicy::default();
        let err = validate(d("2030-01-09"), d("2030-01-12"), today, &policy).unwrap_err();
        assert!(matches!(err, RangeError::StartInPast { .. }));
        assert_eq!(validate(today, d("2030-01-12"), today, &policy), Ok(None));
    }

    #[test]
    fn ninety_one_days_mentions_limit_and_length() {
        let today = d("2030-01-01");
        let start = d("2030-01-02");
        let end = start + Duration::days(90);
        assert_eq!(length(start, end), 91);
        let message = validate(start, end, today, &RangePolicy::default())
            .unwrap_err()
            .to_string();
        assert!(message.contains("90"), "{message}");
        assert!(message.contains("91"), "{message}");
    }

    #[test]
    fn long_range_is_accepted_with_warning() {
        let today = d("2030-01-01");
        let start = d("2030-01-02");
        let warning = validate(start, start + Duration::days(44), today, &RangePolicy::default())
            .unwrap()
            .expect("45 days should warn");
        assert_eq!(warning.length, 45);
        assert!(warning.to_string().contains("30"));
    }

    #[test]
    fn short_range_has_neither_error_nor_warning() {
        let today = d("2030-01-01");
        let start = d("2030-01-02");
        let result = validate(start, start + Duration::days(9), today, &RangePolicy::default());
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn exactly_at_the_limits() {
        let today = d("2030-01-01");
        let start = d("2030-01-02");
        let policy = RangePolicy::default();
        assert_eq!(validate(start, start + Duration::days(29), today, &policy), Ok(None));
        assert!(validate(start, start + Duration::days(89), today, &policy).unwrap().is_some());
    }
}
