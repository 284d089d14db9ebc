//! Client-held session state as it arrives on a request.

use crate::access::{AccessError, Role, Session};
use crate::db;
use crate::error::AppError;
use crate::models::Event;
use crate::password::AccessTokens;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use sqlx::SqlitePool;
use subtle::ConstantTimeEq;
use tracing::warn;

pub const ROLE_HEADER: &str = "x-session-role";
pub const PARTICIPANT_HEADER: &str = "x-participant-id";
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";

/// Unverified session headers. No headers at all means a visitor.
#[derive(Debug, Clone, Default)]
pub struct SessionClaims {
    pub role: Role,
    pub participant_id: Option<i64>,
    pub session_token: Option<String>,
    pub access_token: Option<String>,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl<S> FromRequestParts<S> for SessionClaims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        let role = match header(headers, ROLE_HEADER) {
            Some(role) => role.parse()?,
            None => Role::Visitor,
        };
        let participant_id = header(headers, PARTICIPANT_HEADER)
            .map(str::parse::<i64>)
            .transpose()
            .map_err(|_| AccessError::InvalidSession)?;

        Ok(Self {
            role,
            participant_id,
            session_token: header(headers, SESSION_TOKEN_HEADER).map(str::to_string),
            access_token: header(headers, ACCESS_TOKEN_HEADER).map(str::to_string),
        })
    }
}

impl SessionClaims {
    /// Checks the claims against the store and the event's password gate.
    pub async fn resolve(
        &self,
        pool: &SqlitePool,
        tokens: &AccessTokens,
        event: &Event,
    ) -> Result<Session, AppError> {
        let gate_cleared = !event.has_password()
            || self
                .access_token
                .as_deref()
                .is_some_and(|token| tokens.verify(event, token));

        if self.role == Role::Visitor {
            return Ok(Session::visitor(event.id, gate_cleared));
        }

        let (Some(participant_id), Some(token)) = (self.participant_id, self.session_token.as_deref())
        else {
            return Err(AccessError::InvalidSession.into());
        };

        let participant = db::find_participant(pool, participant_id)
            .await?
            .filter(|p| p.event_id == event.id)
            .filter(|p| bool::from(p.session_token.as_bytes().ct_eq(token.as_bytes())));

        match participant {
            Some(participant) => Ok(Session::member(event.id, self.role, participant.id, gate_cleared)?),
            None => {
                warn!(share_id = %event.share_id, participant_id, "session rejected");
                Err(AccessError::InvalidSession.into())
            }
        }
    }
}
