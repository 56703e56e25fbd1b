use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::validated;
use crate::error::EngineError;
use crate::middleware::AuthUser;
use crate::models::{EventView, Seat};
use crate::services::events::{EventChanges, NewEvent};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/{id}",
            get(get_event).put(edit_event).delete(delete_event),
        )
        .route("/events/{id}/bookings", get(list_event_bookings))
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    #[serde(flatten)]
    pub event: EventView,
    pub vacant: Vec<Seat>,
}

async fn create_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<NewEvent>,
) -> Result<impl IntoResponse, EngineError> {
    let req = validated(req)?;
    let event = state.events.create_event(req, user.user_id).await?;
    state.cache.invalidate_events().await;
    Ok((StatusCode::CREATED, Json(event)))
}

// GET /api/events
async fn list_events(State(state): State<Arc<AppState>>) -> Result<Response, EngineError> {
    if let Some(events) = state.cache.get_events().await {
        return Ok(([(header::HeaderName::from_static("x-cache"), "HIT")], Json(events)).into_response());
    }

    let events = state.events.list_events().await?;
    state.cache.cache_events(&events).await;
    Ok(([(header::HeaderName::from_static("x-cache"), "MISS")], Json(events)).into_response())
}

async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventResponse>, EngineError> {
    let (event, vacant) = state.events.get_event(id).await?;
    Ok(Json(EventResponse { event, vacant }))
}

async fn edit_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<EventChanges>,
) -> Result<impl IntoResponse, EngineError> {
    let req = validated(req)?;
    let event = state.events.edit_event(id, req, user.user_id).await?;
    state.cache.invalidate_events().await;
    Ok(Json(event))
}

async fn delete_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, EngineError> {
    state.events.delete_event(id, user.user_id).await?;
    state.cache.invalidate_events().await;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_event_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    let bookings = state.ledger.list_for_event(id, user.user_id).await?;
    Ok(Json(bookings))
}
