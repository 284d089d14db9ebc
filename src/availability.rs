use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Status as stored. "Unset" is never a row, it is the absence of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AvailabilityStatus {
    Available,
    Maybe,
    Unavailable,
}

impl AvailabilityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AvailabilityStatus::Available => "available",
            AvailabilityStatus::Maybe => "maybe",
            AvailabilityStatus::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown status '{}', expected available, maybe or unavailable",
            self.0
        )
    }
}

impl FromStr for AvailabilityStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(AvailabilityStatus::Available),
            "maybe" => Ok(AvailabilityStatus::Maybe),
            "unavailable" => Ok(AvailabilityStatus::Unavailable),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// What a participant has marked for one day, including "nothing yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Availability {
    #[default]
    Unset,
    Available,
    Maybe,
    Unavailable,
}

impl Availability {
    /// unset -> available -> maybe -> unavailable -> unset
    pub fn cycle(self) -> Self {
        match self {
            Availability::Unset => Availability::Available,
            Availability::Available => Availability::Maybe,
            Availability::Maybe => Availability::Unavailable,
            Availability::Unavailable => Availability::Unset,
        }
    }

    pub fn status(self) -> Option<AvailabilityStatus> {
        match self {
            Availability::Unset => None,
            Availability::Available => Some(AvailabilityStatus::Available),
            Availability::Maybe => Some(AvailabilityStatus::Maybe),
            Availability::Unavailable => Some(AvailabilityStatus::Unavailable),
        }
    }
}

impl From<AvailabilityStatus> for Availability {
    fn from(status: AvailabilityStatus) -> Self {
        match status {
            AvailabilityStatus::Available => Availability::Available,
            AvailabilityStatus::Maybe => Availability::Maybe,
            AvailabilityStatus::Unavailable => Availability::Unavailable,
        }
    }
}

/// One participant's marks across the event range.
///
/// Rows loaded from storage go in through [`Selection::seed`]; interactive
/// changes only go through [`Selection::toggle`]. Unset days are not kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    marks: BTreeMap<NaiveDate, AvailabilityStatus>,
}

impl Selection {
    /// Later entries for the same date replace earlier ones.
    pub fn seed<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, AvailabilityStatus)>,
    {
        Self {
            marks: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, date: NaiveDate) -> Availability {
        self.marks
            .get(&date)
            .copied()
            .map(Availability::from)
            .unwrap_or_default()
    }

    pub fn toggle(&mut self, date: NaiveDate) -> Availability {
        let next = self.get(date).cycle();
        match next.status() {
            Some(status) => {
                self.marks.insert(date, status);
            }
            None => {
                self.marks.remove(&date);
            }
        }
        next
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    /// Marked days in ascending date order.
    pub fn entries(&self) -> impl Iterator<Item = (NaiveDate, AvailabilityStatus)> + '_ {
        self.marks.iter().map(|(date, status)| (*date, *status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Availability; 4] = [
        Availability::Unset,
        Availability::Available,
        Availability::Maybe,
        Availability::Unavailable,
    ];

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn cycle_has_period_four() {
        for state in ALL {
            assert_eq!(state.cycle().cycle().cycle().cycle(), state);
            assert_ne!(state.cycle(), state);
        }
    }

    #[test]
    fn cycle_order() {
        assert_eq!(Availability::Unset.cycle(), Availability::Available);
        assert_eq!(Availability::Available.cycle(), Availability::Maybe);
        assert_eq!(Availability::Maybe.cycle(), Availability::Unavailable);
        assert_eq!(Availability::Unavailable.cycle(), Availability::Unset);
    }

    #[test]
    fn status_parsing() {
        assert_eq!("maybe".parse(), Ok(AvailabilityStatus::Maybe));
        assert!("Maybe".parse::<AvailabilityStatus>().is_err());
        let err = "busy".parse::<AvailabilityStatus>().unwrap_err();
        assert!(err.to_string().contains("busy"));
    }

    #[test]
    fn seeded_selection_continues_cycling_from_stored_state() {
        let day = d("2030-05-01");
        let mut selection = Selection::seed([(day, AvailabilityStatus::Maybe)]);
        assert_eq!(selection.get(day), Availability::Maybe);
        assert_eq!(selection.toggle(day), Availability::Unavailable);
        assert_eq!(selection.toggle(day), Availability::Unset);
        assert!(selection.is_empty());
    }

    #[test]
    fn seeding_keeps_last_entry_per_date() {
        let day = d("2030-05-01");
        let selection = Selection::seed([
            (day, AvailabilityStatus::Available),
            (day, AvailabilityStatus::Unavailable),
        ]);
        assert_eq!(selection.len(), 1);
        assert_eq!(selection.get(day), Availability::Unavailable);
    }

    #[test]
    fn entries_are_sorted_and_skip_unset() {
        let mut selection = Selection::default();
        selection.toggle(d("2030-05-03"));
        selection.toggle(d("2030-05-01"));
        selection.toggle(d("2030-05-02"));
        selection.toggle(d("2030-05-02"));
        selection.toggle(d("2030-05-02"));
        selection.toggle(d("2030-05-02"));
        let entries: Vec<_> = selection.entries().collect();
        assert_eq!(
            entries,
            vec![
                (d("2030-05-01"), AvailabilityStatus::Available),
                (d("2030-05-03"), AvailabilityStatus::Available),
            ]
        );
    }
}
