//! termin: pick a date together.
//!
//! Participants mark each day of an event's range as available, maybe or
//! unavailable; the service ranks the days and lets the organizer lock one.

pub mod access;
pub mod availability;
pub mod calendar;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod password;
pub mod scoring;
pub mod share_id;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use state::AppState;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub fn router(app_state: AppState) -> Router {
    let assets = ServeDir::new(&app_state.config.static_dir);

    Router::new()
        .route("/", get(handlers::index_handler))
        .route("/e/{share_id}", get(handlers::index_handler))
        .nest_service("/assets", assets)
        .route("/api/events", post(handlers::create_event_handler))
        .route(
            "/api/events/{share_id}",
            get(handlers::get_event_handler).delete(handlers::delete_event_handler),
        )
        .route(
            "/api/events/{share_id}/calculate",
            get(handlers::calculate_handler),
        )
        .route("/api/events/{share_id}/lock", post(handlers::lock_handler))
        .route("/api/events/{share_id}/reopen", post(handlers::reopen_handler))
        .route(
            "/api/events/{share_id}/verify-password",
            post(handlers::verify_password_handler),
        )
        .route("/api/participants", post(handlers::join_handler))
        .route(
            "/api/participants/{participant_id}/availability",
            get(handlers::own_availability_handler).delete(handlers::clear_availability_handler),
        )
        .route(
            "/api/availability",
            post(handlers::submit_availability_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
