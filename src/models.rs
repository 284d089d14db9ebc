use crate::availability::AvailabilityStatus;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Event {
    pub id: i64,
    pub share_id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub creator_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub is_locked: bool,
    pub calculated_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
}

impl Event {
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Public shape of an event; never carries the password hash.
#[derive(Debug, Serialize)]
pub struct EventView {
    pub id: i64,
    pub share_id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub creator_name: Option<String>,
    pub has_password: bool,
    pub is_locked: bool,
    pub calculated_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
}

impl From<&Event> for EventView {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id,
            share_id: event.share_id.clone(),
            name: event.name.clone(),
            start_date: event.start_date,
            end_date: event.end_date,
            creator_name: event.creator_name.clone(),
            has_password: event.has_password(),
            is_locked: event.is_locked,
            calculated_date: event.calculated_date,
            created_at: event.created_at,
        }
    }
}

pub struct NewEvent<'a> {
    pub share_id: &'a str,
    pub name: &'a str,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub creator_name: Option<&'a str>,
    pub password_hash: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Participant {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    #[serde(skip_serializing)]
    pub session_token: String,
    pub has_submitted: bool,
    pub joined_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Observation {
    pub participant_id: i64,
    pub date: NaiveDate,
    pub status: AvailabilityStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateStatus {
    pub date: NaiveDate,
    pub status: AvailabilityStatus,
}
