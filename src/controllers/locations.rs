use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::EngineError;
use crate::middleware::AuthUser;
use crate::services::locations::{LocationChanges, NewLocation, Rename};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/locations", post(create_location))
        .route(
            "/locations/{id}",
            get(get_location).put(edit_location).delete(delete_location),
        )
        .route("/locations/{id}/rename", put(rename_location))
        .route("/locations/{id}/seats", get(list_location_seats))
}

async fn create_location(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<NewLocation>,
) -> Result<impl IntoResponse, EngineError> {
    let location = state.locations.create_location(req, user.user_id).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

async fn get_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    Ok(Json(state.locations.get_location(id).await?))
}

async fn edit_location(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<LocationChanges>,
) -> Result<impl IntoResponse, EngineError> {
    let location = state.locations.edit_location(id, req, user.user_id).await?;
    state.cache.invalidate_events().await;
    Ok(Json(location))
}

async fn rename_location(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<Rename>,
) -> Result<impl IntoResponse, EngineError> {
    Ok(Json(state.locations.rename_location(id, req, user.user_id).await?))
}

// Cascades to seats, events and bookings
async fn delete_location(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, EngineError> {
    state.locations.delete_location(id, user.user_id).await?;
    state.cache.invalidate_events().await;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_location_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    Ok(Json(state.locations.list_location_seats(id).await?))
}
