//! Who may do what to an event.
//!
//! Sessions are held by the client and sent with every request. The admin
//! role is self-asserted by the event creator's client; there is no server
//! side admin credential. What the server does verify is that a participant
//! or admin session names a real participant of the event with the matching
//! token, and that password-protected events have been unlocked with an
//! access token. Checking the password itself happens before any session
//! exists and does not go through [`authorize`].

use crate::lifecycle::EventState;
use crate::models::Event;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Participant,
    #[default]
    Visitor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Participant => "participant",
            Role::Visitor => "visitor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "participant" => Ok(Role::Participant),
            "visitor" => Ok(Role::Visitor),
            _ => Err(AccessError::InvalidSession),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("this event is password protected")]
    PasswordRequired,
    #[error("invalid session")]
    InvalidSession,
    #[error("session belongs to a different event")]
    WrongEvent,
    #[error("join the event first")]
    NotAParticipant,
    #[error("only the event admin can do that")]
    AdminOnly,
    #[error("event is locked")]
    EventLocked,
    #[error("you can only manage your own availability")]
    NotOwner,
}

impl AccessError {
    /// 401-style failures, as opposed to the 403-style ones.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AccessError::PasswordRequired | AccessError::InvalidSession | AccessError::WrongEvent
        )
    }
}

/// A verified client session for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub event_id: i64,
    pub role: Role,
    pub participant_id: Option<i64>,
    /// Whether a valid access token for the event's password was presented.
    pub gate_cleared: bool,
}

impl Session {
    pub fn visitor(event_id: i64, gate_cleared: bool) -> Self {
        Self {
            event_id,
            role: Role::Visitor,
            participant_id: None,
            gate_cleared,
        }
    }

    /// Session of an existing participant. Visitors never carry a participant.
    pub fn member(
        event_id: i64,
        role: Role,
        participant_id: i64,
        gate_cleared: bool,
    ) -> Result<Self, AccessError> {
        if role == Role::Visitor {
            return Err(AccessError::InvalidSession);
        }
        Ok(Self {
            event_id,
            role,
            participant_id: Some(participant_id),
            gate_cleared,
        })
    }

    /// Session after joining as `participant_id`. Admins stay admins.
    pub fn join(self, participant_id: i64) -> Self {
        let role = match self.role {
            Role::Admin => Role::Admin,
            Role::Participant | Role::Visitor => Role::Participant,
        };
        Self {
            role,
            participant_id: Some(participant_id),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Calculate,
    Join,
    Submit { participant_id: i64 },
    ReadOwnAvailability { participant_id: i64 },
    ClearOwnAvailability { participant_id: i64 },
    Lock,
    Reopen,
    Delete,
}

pub fn authorize(session: &Session, event: &Event, action: Action) -> Result<(), AccessError> {
    if session.event_id != event.id {
        return Err(AccessError::WrongEvent);
    }
    if event.has_password() && !session.gate_cleared {
        return Err(AccessError::PasswordRequired);
    }

    let open = event.state() == EventState::Open;
    match action {
        Action::View | Action::Calculate => Ok(()),
        Action::Join if open => Ok(()),
        Action::Join => Err(AccessError::EventLocked),
        Action::Submit { participant_id } | Action::ClearOwnAvailability { participant_id } => {
            require_owner(session, participant_id)?;
            if open {
                Ok(())
            } else {
                Err(AccessError::EventLocked)
            }
        }
        Action::ReadOwnAvailability { participant_id } => require_owner(session, participant_id),
        Action::Lock | Action::Reopen | Action::Delete => match session.role {
            Role::Admin => Ok(()),
            Role::Participant | Role::Visitor => Err(AccessError::AdminOnly),
        },
    }
}

fn require_owner(session: &Session, participant_id: i64) -> Result<(), AccessError> {
    match session.participant_id {
        None => Err(AccessError::NotAParticipant),
        Some(own) if own == participant_id => Ok(()),
        Some(_) => Err(AccessError::NotOwner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn event(password_hash: Option<&str>, locked: bool) -> Event {
        let start = NaiveDate::from_ymd_opt(2030, 6, 1).unwrap();
        Event {
            id: 1,
            share_id: "brave-heron-17".to_string(),
            name: "Board games".to_string(),
            start_date: start,
            end_date: NaiveDate::from_ymd_opt(2030, 6, 14).unwrap(),
            creator_name: Some("Ola".to_string()),
            password_hash: password_hash.map(str::to_string),
            is_locked: locked,
            calculated_date: locked.then_some(start),
            created_at: start.and_hms_opt(9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn visitors_can_look_and_join_but_not_submit() {
        let open = event(None, false);
        let visitor = Session::visitor(1, false);
        assert_eq!(authorize(&visitor, &open, Action::View), Ok(()));
        assert_eq!(authorize(&visitor, &open, Action::Calculate), Ok(()));
        assert_eq!(authorize(&visitor, &open, Action::Join), Ok(()));
        assert_eq!(
            authorize(&visitor, &open, Action::Submit { participant_id: 3 }),
            Err(AccessError::NotAParticipant)
        );
        assert_eq!(authorize(&visitor, &open, Action::Lock), Err(AccessError::AdminOnly));
    }

    #[test]
    fn participants_only_touch_their_own_marks() {
        let open = event(None, false);
        let session = Session::member(1, Role::Participant, 3, false).unwrap();
        assert_eq!(authorize(&session, &open, Action::Submit { participant_id: 3 }), Ok(()));
        assert_eq!(
            authorize(&session, &open, Action::Submit { participant_id: 4 }),
            Err(AccessError::NotOwner)
        );
        assert_eq!(authorize(&session, &open, Action::Reopen), Err(AccessError::AdminOnly));
    }

    #[test]
    fn locked_events_freeze_joining_and_submitting() {
        let locked = event(None, true);
        let session = Session::member(1, Role::Participant, 3, false).unwrap();
        assert_eq!(authorize(&session, &locked, Action::Join), Err(AccessError::EventLocked));
        assert_eq!(
            authorize(&session, &locked, Action::Submit { participant_id: 3 }),
            Err(AccessError::EventLocked)
        );
        assert_eq!(
            authorize(&session, &locked, Action::ReadOwnAvailability { participant_id: 3 }),
            Ok(())
        );
    }

    #[test]
    fn admins_manage_the_event() {
        let locked = event(None, true);
        let admin = Session::member(1, Role::Admin, 1, false).unwrap();
        assert_eq!(authorize(&admin, &locked, Action::Reopen), Ok(()));
        assert_eq!(authorize(&admin, &locked, Action::Delete), Ok(()));
    }

    #[test]
    fn password_gate_applies_to_every_role() {
        let gated = event(Some("$argon2id$stub"), false);
        let admin = Session::member(1, Role::Admin, 1, false).unwrap();
        assert_eq!(authorize(&admin, &gated, Action::View), Err(AccessError::PasswordRequired));
        assert_eq!(
            authorize(&Session::visitor(1, false), &gated, Action::Calculate),
            Err(AccessError::PasswordRequired)
        );

        let cleared = Session { gate_cleared: true, ..admin };
        assert_eq!(authorize(&cleared, &gated, Action::Lock), Ok(()));
    }

    #[test]
    fn sessions_are_bound_to_one_event() {
        let open = event(None, false);
        let elsewhere = Session::visitor(2, true);
        assert_eq!(authorize(&elsewhere, &open, Action::View), Err(AccessError::WrongEvent));
    }

    #[test]
    fn joining_upgrades_visitors_and_keeps_admins() {
        let joined = Session::visitor(1, false).join(5);
        assert_eq!(joined.role, Role::Participant);
        assert_eq!(joined.participant_id, Some(5));

        let admin = Session::member(1, Role::Admin, 1, false).unwrap().join(6);
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.participant_id, Some(6));
    }

    #[test]
    fn visitor_sessions_cannot_carry_a_participant() {
        assert_eq!(
            Session::member(1, Role::Visitor, 3, false),
            Err(AccessError::InvalidSession)
        );
    }

    #[test]
    fn roles_parse_from_their_names() {
        assert_eq!("admin".parse(), Ok(Role::Admin));
        assert_eq!("visitor".parse(), Ok(Role::Visitor));
        assert!("root".parse::<Role>().is_err());
    }
}
