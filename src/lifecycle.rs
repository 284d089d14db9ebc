//! Open/locked state machine for events.
//!
//! These functions only decide whether a transition is allowed. Writing it is
//! `db::apply_transition`, which re-checks the prior state in the `UPDATE`
//! itself so two admins racing to lock cannot both win.

use crate::access::Role;
use crate::calendar;
use crate::models::Event;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    Open,
    Locked(NaiveDate),
}

impl EventState {
    pub fn is_locked(self) -> bool {
        matches!(self, EventState::Locked(_))
    }

    pub fn calculated_date(self) -> Option<NaiveDate> {
        match self {
            EventState::Open => None,
            EventState::Locked(date) => Some(date),
        }
    }
}

impl Event {
    pub fn state(&self) -> EventState {
        match (self.is_locked, self.calculated_date) {
            (true, Some(date)) => EventState::Locked(date),
            _ => EventState::Open,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("only the event admin can {0} it")]
    Forbidden(&'static str),
    #[error("event is already locked")]
    AlreadyLocked,
    #[error("event is not locked")]
    NotLocked,
    #[error("{date} is outside the event range {start} to {end}")]
    DateOutOfRange {
        date: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub event_id: i64,
    pub from: EventState,
    pub to: EventState,
}

impl Transition {
    /// The error to report when the stored state no longer matches `from`.
    pub fn conflict(&self) -> LifecycleError {
        match self.to {
            EventState::Locked(_) => LifecycleError::AlreadyLocked,
            EventState::Open => LifecycleError::NotLocked,
        }
    }

    pub fn apply_to(&self, event: &mut Event) {
        event.is_locked = self.to.is_locked();
        event.calculated_date = self.to.calculated_date();
    }
}

pub fn lock(event: &Event, chosen_date: NaiveDate, role: Role) -> Result<Transition, LifecycleError> {
    if role != Role::Admin {
        return Err(LifecycleError::Forbidden("lock"));
    }
    if event.state().is_locked() {
        return Err(LifecycleError::AlreadyLocked);
    }
    if !calendar::contains(chosen_date, event.start_date, event.end_date) {
        return Err(LifecycleError::DateOutOfRange {
            date: chosen_date,
            start: event.start_date,
            end: event.end_date,
        });
    }
    Ok(Transition {
        event_id: event.id,
        from: EventState::Open,
        to: EventState::Locked(chosen_date),
    })
}

pub fn reopen(event: &Event, role: Role) -> Result<Transition, LifecycleError> {
    if role != Role::Admin {
        return Err(LifecycleError::Forbidden("reopen"));
    }
    match event.state() {
        EventState::Open => Err(LifecycleError::NotLocked),
        from @ EventState::Locked(_) => Ok(Transition {
            event_id: event.id,
            from,
            to: EventState::Open,
        }),
    }
}
