use crate::availability::AvailabilityStatus;
use crate::lifecycle::{EventState, Transition};
use crate::models::{Event, NewEvent, Observation, Participant};
use chrono::NaiveDate;
use nanoid::nanoid;
use sqlx::{Executor, Sqlite, SqlitePool};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

const SESSION_TOKEN_LEN: usize = 32;

pub async fn connect(database_url: &str) -> sqlx::Result<SqlitePool> {
    let connect_options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool_options = if database_url.contains(":memory:") || database_url.contains("mode=memory") {
        // Each connection to an in-memory database sees its own database, so
        // keep exactly one and never let it expire.
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    let pool = pool_options
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(connect_options)
        .await?;
    info!(url = %database_url, "database connected");
    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> sqlx::Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            share_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            start_date DATE NOT NULL,
            end_date DATE NOT NULL,
            creator_name TEXT,
            password_hash TEXT,
            is_locked BOOLEAN NOT NULL DEFAULT 0,
            calculated_date DATE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (start_date < end_date),
            CHECK ((is_locked = 0 AND calculated_date IS NULL)
                OR (is_locked = 1 AND calculated_date IS NOT NULL))
        );",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS participants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            session_token TEXT NOT NULL UNIQUE,
            has_submitted BOOLEAN NOT NULL DEFAULT 0,
            joined_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (event_id) REFERENCES events (id) ON DELETE CASCADE
        );",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS availability (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL,
            participant_id INTEGER NOT NULL,
            date DATE NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('available', 'maybe', 'unavailable')),
            FOREIGN KEY (event_id) REFERENCES events (id) ON DELETE CASCADE,
            FOREIGN KEY (participant_id) REFERENCES participants (id) ON DELETE CASCADE,
            UNIQUE(participant_id, date)
        );",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS availability_event ON availability (event_id)")
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn share_id_taken(pool: &SqlitePool, share_id: &str) -> sqlx::Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM events WHERE share_id = ?")
        .bind(share_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Inserts the event together with its creator, who becomes the admin participant.
pub async fn create_event(
    pool: &SqlitePool,
    new: &NewEvent<'_>,
    admin_name: &str,
) -> sqlx::Result<(Event, Participant)> {
    let mut tx = pool.begin().await?;
    let event: Event = sqlx::query_as(
        "INSERT INTO events (share_id, name, start_date, end_date, creator_name, password_hash)
         VALUES (?, ?, ?, ?, ?, ?) RETURNING *",
    )
    .bind(new.share_id)
    .bind(new.name)
    .bind(new.start_date)
    .bind(new.end_date)
    .bind(new.creator_name)
    .bind(new.password_hash)
    .fetch_one(&mut *tx)
    .await?;
    let admin: Participant = sqlx::query_as(
        "INSERT INTO participants (event_id, name, session_token) VALUES (?, ?, ?) RETURNING *",
    )
    .bind(event.id)
    .bind(admin_name)
    .bind(nanoid!(SESSION_TOKEN_LEN))
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok((event, admin))
}

pub async fn find_event_by_id(pool: &SqlitePool, event_id: i64) -> sqlx::Result<Option<Event>> {
    sqlx::query_as("SELECT * FROM events WHERE id = ?")
        .bind(event_id)
        .fetch_optional(pool)
        .await
}

pub async fn find_event(pool: &SqlitePool, share_id: &str) -> sqlx::Result<Option<Event>> {
    sqlx::query_as("SELECT * FROM events WHERE share_id = ?")
        .bind(share_id)
        .fetch_optional(pool)
        .await
}

/// Removes the event with its participants and marks.
pub async fn delete_event(pool: &SqlitePool, event_id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM events WHERE id = ?")
        .bind(event_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Compare-and-swap on `is_locked`. `false` means the event was not in
/// `transition.from` any more.
pub async fn apply_transition(pool: &SqlitePool, transition: &Transition) -> sqlx::Result<bool> {
    let query = match transition.to {
        EventState::Locked(date) => sqlx::query(
            "UPDATE events SET is_locked = 1, calculated_date = ? WHERE id = ? AND is_locked = 0",
        )
        .bind(date),
        EventState::Open => sqlx::query(
            "UPDATE events SET is_locked = 0, calculated_date = NULL WHERE id = ? AND is_locked = 1",
        ),
    };
    let result = query.bind(transition.event_id).execute(pool).await?;
    Ok(result.rows_affected() == 1)
}

pub async fn create_participant(
    pool: &SqlitePool,
    event_id: i64,
    name: &str,
) -> sqlx::Result<Participant> {
    sqlx::query_as(
        "INSERT INTO participants (event_id, name, session_token) VALUES (?, ?, ?) RETURNING *",
    )
    .bind(event_id)
    .bind(name)
    .bind(nanoid!(SESSION_TOKEN_LEN))
    .fetch_one(pool)
    .await
}

pub async fn find_participant(
    pool: &SqlitePool,
    participant_id: i64,
) -> sqlx::Result<Option<Participant>> {
    sqlx::query_as("SELECT * FROM participants WHERE id = ?")
        .bind(participant_id)
        .fetch_optional(pool)
        .await
}

pub async fn list_participants(pool: &SqlitePool, event_id: i64) -> sqlx::Result<Vec<Participant>> {
    sqlx::query_as("SELECT * FROM participants WHERE event_id = ? ORDER BY joined_at, id")
        .bind(event_id)
        .fetch_all(pool)
        .await
}

pub async fn count_participants<'e, E>(executor: E, event_id: i64) -> sqlx::Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM participants WHERE event_id = ?")
        .bind(event_id)
        .fetch_one(executor)
        .await
}

pub async fn event_observations<'e, E>(executor: E, event_id: i64) -> sqlx::Result<Vec<Observation>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        "SELECT participant_id, date, status FROM availability WHERE event_id = ? ORDER BY date, participant_id",
    )
    .bind(event_id)
    .fetch_all(executor)
    .await
}

pub async fn participant_observations(
    pool: &SqlitePool,
    participant_id: i64,
) -> sqlx::Result<Vec<Observation>> {
    sqlx::query_as(
        "SELECT participant_id, date, status FROM availability WHERE participant_id = ? ORDER BY date",
    )
    .bind(participant_id)
    .fetch_all(pool)
    .await
}

/// Upserts one participant's batch of marks and flags them as having submitted.
///
/// Returns `false` without writing anything when the event is locked (or the
/// participant is gone) by the time the transaction runs.
pub async fn submit_availability(
    pool: &SqlitePool,
    event_id: i64,
    participant_id: i64,
    marks: &[(NaiveDate, AvailabilityStatus)],
) -> sqlx::Result<bool> {
    let mut tx = pool.begin().await?;
    // Writing first takes the write lock, so a concurrent lock cannot slip in.
    let flagged = sqlx::query(
        "UPDATE participants SET has_submitted = 1
         WHERE id = ? AND event_id = ?
           AND (SELECT is_locked FROM events WHERE id = ?) = 0",
    )
    .bind(participant_id)
    .bind(event_id)
    .bind(event_id)
    .execute(&mut *tx)
    .await?;
    if flagged.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    for (date, status) in marks {
        sqlx::query(
            "INSERT INTO availability (event_id, participant_id, date, status) VALUES (?, ?, ?, ?)
             ON CONFLICT(participant_id, date) DO UPDATE SET status = excluded.status",
        )
        .bind(event_id)
        .bind(participant_id)
        .bind(*date)
        .bind(*status)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(true)
}

pub async fn clear_availability(pool: &SqlitePool, participant_id: i64) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM availability WHERE participant_id = ?")
        .bind(participant_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
