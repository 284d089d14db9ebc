use crate::{
    access::{self, AccessError, Action, Role},
    availability::{AvailabilityStatus, Selection, UnknownStatus},
    calendar, db,
    error::AppError,
    extract::SessionClaims,
    lifecycle,
    models::{DateStatus, Event, EventView, NewEvent, Observation, Participant},
    notify::ChangeKind,
    password, scoring,
    scoring::DateScore,
    share_id,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::Html,
};
use chrono::{NaiveDate, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

const MAX_EVENT_NAME: usize = 100;
const MAX_PARTICIPANT_NAME: usize = 50;
const DEFAULT_ORGANIZER: &str = "Organizer";

fn clean_name(field: &str, raw: &str, max: usize) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest(format!("{field} cannot be empty")));
    }
    if name.chars().count() > max {
        return Err(AppError::BadRequest(format!(
            "{field} cannot be longer than {max} characters"
        )));
    }
    Ok(name.to_string())
}

/// Strict `YYYY-MM-DD`.
fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, AppError> {
    let invalid = || AppError::BadRequest(format!("{field} must be a date in YYYY-MM-DD format"));
    if raw.len() != 10 {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid())
}

async fn load_event(app_state: &AppState, share_id: &str) -> Result<Event, AppError> {
    db::find_event(&app_state.pool, share_id)
        .await?
        .ok_or_else(AppError::event_not_found)
}

async fn load_participant(
    app_state: &AppState,
    participant_id: i64,
) -> Result<(Participant, Event), AppError> {
    let not_found = || AppError::NotFound("participant not found".to_string());
    let participant = db::find_participant(&app_state.pool, participant_id)
        .await?
        .ok_or_else(not_found)?;
    let event = db::find_event_by_id(&app_state.pool, participant.event_id)
        .await?
        .ok_or_else(not_found)?;
    Ok((participant, event))
}

pub async fn index_handler(State(app_state): State<AppState>) -> Html<String> {
    let index = app_state.config.static_dir.join("index.html");
    tokio::fs::read_to_string(&index)
        .await
        .map(Html)
        .unwrap_or_else(|_| Html("<h1>index.html is missing</h1>".to_string()))
}

#[derive(Deserialize)]
pub struct CreateEventPayload {
    name: String,
    start_date: String,
    end_date: String,
    creator_name: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedEvent {
    id: i64,
    share_id: String,
    share_url: String,
    participant_id: i64,
    session_token: String,
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

pub async fn create_event_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateEventPayload>,
) -> Result<(StatusCode, Json<CreatedEvent>), AppError> {
    let config = &app_state.config;
    let name = clean_name("name", &payload.name, MAX_EVENT_NAME)?;
    let start_date = parse_date("start_date", &payload.start_date)?;
    let end_date = parse_date("end_date", &payload.end_date)?;
    let today = Utc::now().date_naive();
    let warning = calendar::validate(start_date, end_date, today, &config.range_policy)?;

    let creator_name = match payload.creator_name.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(clean_name("creator_name", raw, MAX_PARTICIPANT_NAME)?),
    };

    let password_hash = match payload.password {
        None => None,
        Some(plain) => {
            password::validate_strength(&plain)?;
            Some(tokio::task::spawn_blocking(move || password::hash_password(&plain)).await??)
        }
    };

    let pool = &app_state.pool;
    let mut rng = StdRng::from_entropy();
    let share_id = share_id::mint(
        &mut rng,
        move |candidate| async move { db::share_id_taken(pool, &candidate).await },
        config.share_id_attempts,
    )
    .await?;

    let (event, admin) = db::create_event(
        pool,
        &NewEvent {
            share_id: &share_id,
            name: &name,
            start_date,
            end_date,
            creator_name: creator_name.as_deref(),
            password_hash: password_hash.as_deref(),
        },
        creator_name.as_deref().unwrap_or(DEFAULT_ORGANIZER),
    )
    .await?;

    info!(
        share_id = %event.share_id,
        days = calendar::length(start_date, end_date),
        protected = event.has_password(),
        "event created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatedEvent {
            id: event.id,
            share_url: config.share_url(&event.share_id),
            access_token: config.access_tokens.issue(&event),
            share_id: event.share_id,
            participant_id: admin.id,
            session_token: admin.session_token,
            role: Role::Admin,
            warning: warning.map(|w| w.to_string()),
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct EventDetails {
    event: EventView,
    days: Vec<NaiveDate>,
    participants: Vec<Participant>,
    availability: Vec<Observation>,
    role: Role,
}

pub async fn get_event_handler(
    State(app_state): State<AppState>,
    Path(share_id): Path<String>,
    claims: SessionClaims,
) -> Result<Json<EventDetails>, AppError> {
    let event = load_event(&app_state, &share_id).await?;
    let session = claims
        .resolve(&app_state.pool, &app_state.config.access_tokens, &event)
        .await?;
    access::authorize(&session, &event, Action::View)?;

    let days = calendar::generate_sequence(event.start_date, event.end_date)?;
    let participants = db::list_participants(&app_state.pool, event.id).await?;
    let availability = db::event_observations(&app_state.pool, event.id).await?;
    Ok(Json(EventDetails {
        event: EventView::from(&event),
        days,
        participants,
        availability,
        role: session.role,
    }))
}

pub async fn delete_event_handler(
    State(app_state): State<AppState>,
    Path(share_id): Path<String>,
    claims: SessionClaims,
) -> Result<StatusCode, AppError> {
    let event = load_event(&app_state, &share_id).await?;
    let session = claims
        .resolve(&app_state.pool, &app_state.config.access_tokens, &event)
        .await?;
    access::authorize(&session, &event, Action::Delete)?;

    if !db::delete_event(&app_state.pool, event.id).await? {
        return Err(AppError::event_not_found());
    }
    info!(share_id = %event.share_id, "event deleted");
    app_state.notifier.publish(&event.share_id, ChangeKind::Deleted);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct JoinPayload {
    event_id: String,
    name: String,
}

#[derive(Debug, Serialize)]
pub struct Joined {
    id: i64,
    session_token: String,
    role: Role,
}

pub async fn join_handler(
    State(app_state): State<AppState>,
    claims: SessionClaims,
    Json(payload): Json<JoinPayload>,
) -> Result<(StatusCode, Json<Joined>), AppError> {
    let event = load_event(&app_state, &payload.event_id).await?;
    let session = claims
        .resolve(&app_state.pool, &app_state.config.access_tokens, &event)
        .await?;
    access::authorize(&session, &event, Action::Join)?;
    let name = clean_name("name", &payload.name, MAX_PARTICIPANT_NAME)?;

    let participant = db::create_participant(&app_state.pool, event.id, &name).await?;
    let session = session.join(participant.id);
    info!(share_id = %event.share_id, participant_id = participant.id, "participant joined");
    app_state
        .notifier
        .publish(&event.share_id, ChangeKind::ParticipantJoined);

    Ok((
        StatusCode::CREATED,
        Json(Joined {
            id: participant.id,
            session_token: participant.session_token,
            role: session.role,
        }),
    ))
}

#[derive(Deserialize)]
pub struct DateStatusPayload {
    date: String,
    status: String,
}

#[derive(Deserialize)]
pub struct SubmitAvailabilityPayload {
    participant_id: i64,
    dates: Vec<DateStatusPayload>,
}

pub async fn submit_availability_handler(
    State(app_state): State<AppState>,
    claims: SessionClaims,
    Json(payload): Json<SubmitAvailabilityPayload>,
) -> Result<Json<Value>, AppError> {
    if payload.dates.is_empty() {
        return Err(AppError::BadRequest("dates cannot be empty".to_string()));
    }
    let (participant, event) = load_participant(&app_state, payload.participant_id).await?;
    let session = claims
        .resolve(&app_state.pool, &app_state.config.access_tokens, &event)
        .await?;
    access::authorize(
        &session,
        &event,
        Action::Submit {
            participant_id: participant.id,
        },
    )?;

    let mut marks = Vec::with_capacity(payload.dates.len());
    for entry in &payload.dates {
        let date = parse_date("date", &entry.date)?;
        let status: AvailabilityStatus = entry
            .status
            .parse()
            .map_err(|e: UnknownStatus| AppError::BadRequest(e.to_string()))?;
        if !calendar::contains(date, event.start_date, event.end_date) {
            return Err(AppError::BadRequest(format!(
                "{date} is outside the event range {} to {}",
                event.start_date, event.end_date
            )));
        }
        marks.push((date, status));
    }
    let marks: Vec<_> = Selection::seed(marks).entries().collect();

    if !db::submit_availability(&app_state.pool, event.id, participant.id, &marks).await? {
        return Err(AccessError::EventLocked.into());
    }
    info!(
        share_id = %event.share_id,
        participant_id = participant.id,
        dates = marks.len(),
        "availability submitted"
    );
    app_state
        .notifier
        .publish(&event.share_id, ChangeKind::AvailabilityChanged);
    Ok(Json(json!({ "success": true })))
}

pub async fn own_availability_handler(
    State(app_state): State<AppState>,
    Path(participant_id): Path<i64>,
    claims: SessionClaims,
) -> Result<Json<Vec<DateStatus>>, AppError> {
    let (participant, event) = load_participant(&app_state, participant_id).await?;
    let session = claims
        .resolve(&app_state.pool, &app_state.config.access_tokens, &event)
        .await?;
    access::authorize(
        &session,
        &event,
        Action::ReadOwnAvailability {
            participant_id: participant.id,
        },
    )?;

    let rows = db::participant_observations(&app_state.pool, participant.id).await?;
    let selection = Selection::seed(rows.into_iter().map(|row| (row.date, row.status)));
    Ok(Json(
        selection
            .entries()
            .map(|(date, status)| DateStatus { date, status })
            .collect(),
    ))
}

pub async fn clear_availability_handler(
    State(app_state): State<AppState>,
    Path(participant_id): Path<i64>,
    claims: SessionClaims,
) -> Result<StatusCode, AppError> {
    let (participant, event) = load_participant(&app_state, participant_id).await?;
    let session = claims
        .resolve(&app_state.pool, &app_state.config.access_tokens, &event)
        .await?;
    access::authorize(
        &session,
        &event,
        Action::ClearOwnAvailability {
            participant_id: participant.id,
        },
    )?;

    let removed = db::clear_availability(&app_state.pool, participant.id).await?;
    info!(share_id = %event.share_id, participant_id = participant.id, removed, "availability cleared");
    app_state
        .notifier
        .publish(&event.share_id, ChangeKind::AvailabilityChanged);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn calculate_handler(
    State(app_state): State<AppState>,
    Path(share_id): Path<String>,
    claims: SessionClaims,
) -> Result<Json<Vec<DateScore>>, AppError> {
    let event = load_event(&app_state, &share_id).await?;
    let session = claims
        .resolve(&app_state.pool, &app_state.config.access_tokens, &event)
        .await?;
    access::authorize(&session, &event, Action::Calculate)?;
    Ok(Json(scoring::rank_event(&app_state.pool, event.id).await?))
}

#[derive(Deserialize)]
pub struct LockPayload {
    chosen_date: String,
}

pub async fn lock_handler(
    State(app_state): State<AppState>,
    Path(share_id): Path<String>,
    claims: SessionClaims,
    Json(payload): Json<LockPayload>,
) -> Result<Json<EventView>, AppError> {
    let mut event = load_event(&app_state, &share_id).await?;
    let session = claims
        .resolve(&app_state.pool, &app_state.config.access_tokens, &event)
        .await?;
    access::authorize(&session, &event, Action::Lock)?;
    let chosen_date = parse_date("chosen_date", &payload.chosen_date)?;

    let transition = lifecycle::lock(&event, chosen_date, session.role)?;
    if !db::apply_transition(&app_state.pool, &transition).await? {
        return Err(transition.conflict().into());
    }
    transition.apply_to(&mut event);
    info!(share_id = %event.share_id, %chosen_date, "event locked");
    app_state.notifier.publish(&event.share_id, ChangeKind::Locked);
    Ok(Json(EventView::from(&event)))
}

pub async fn reopen_handler(
    State(app_state): State<AppState>,
    Path(share_id): Path<String>,
    claims: SessionClaims,
) -> Result<Json<EventView>, AppError> {
    let mut event = load_event(&app_state, &share_id).await?;
    let session = claims
        .resolve(&app_state.pool, &app_state.config.access_tokens, &event)
        .await?;
    access::authorize(&session, &event, Action::Reopen)?;

    let transition = lifecycle::reopen(&event, session.role)?;
    if !db::apply_transition(&app_state.pool, &transition).await? {
        return Err(transition.conflict().into());
    }
    transition.apply_to(&mut event);
    info!(share_id = %event.share_id, "event reopened");
    app_state
        .notifier
        .publish(&event.share_id, ChangeKind::Reopened);
    Ok(Json(EventView::from(&event)))
}

#[derive(Deserialize)]
pub struct VerifyPasswordPayload {
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGranted {
    access_token: String,
    event_id: i64,
}

/// Unknown events, events without a password and wrong passwords all answer
/// the same 401 after the same amount of hashing.
pub async fn verify_password_handler(
    State(app_state): State<AppState>,
    Path(share_id): Path<String>,
    Json(payload): Json<VerifyPasswordPayload>,
) -> Result<Json<AccessGranted>, AppError> {
    let event = db::find_event(&app_state.pool, &share_id).await?;
    let plain = payload.password;

    let Some((event, hash)) =
        event.and_then(|e| e.password_hash.clone().map(|hash| (e, hash)))
    else {
        tokio::task::spawn_blocking(move || password::burn_verification_time(&plain)).await?;
        return Err(AppError::incorrect_password());
    };

    let matches =
        tokio::task::spawn_blocking(move || password::verify_password(&plain, &hash)).await?;
    if !matches {
        warn!(share_id = %event.share_id, "incorrect event password");
        return Err(AppError::incorrect_password());
    }

    let access_token = app_state
        .config
        .access_tokens
        .issue(&event)
        .ok_or_else(AppError::incorrect_password)?;
    Ok(Json(AccessGranted {
        access_token,
        event_id: event.id,
    }))
}
