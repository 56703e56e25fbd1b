use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::EngineError;
use crate::middleware::AuthUser;
use crate::models::BookingStatus;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(list_bookings).post(create_booking))
        .route(
            "/bookings/{id}",
            get(get_booking).put(update_booking_status).delete(cancel_booking),
        )
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub event_id: Uuid,
    pub seat_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: BookingStatus,
}

// POST /api/bookings
async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, EngineError> {
    let booking = state.ledger.reserve(req.event_id, req.seat_id, user.user_id).await?;
    state.cache.invalidate_events().await;
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings
async fn list_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, EngineError> {
    let bookings = state.ledger.list_for_guest(user.user_id).await?;
    Ok(Json(bookings))
}

async fn get_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    let booking = state.ledger.get(id, user.user_id).await?;
    Ok(Json(booking))
}

// PUT /api/bookings/{id}
async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<impl IntoResponse, EngineError> {
    let booking = state.ledger.set_status(id, req.status, user.user_id).await?;
    if !booking.status.is_held() {
        state.cache.invalidate_events().await;
    }
    Ok(Json(booking))
}

// DELETE /api/bookings/{id}
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    let booking = state.ledger.cancel(id, user.user_id).await?;
    state.cache.invalidate_events().await;
    Ok(Json(booking))
}
