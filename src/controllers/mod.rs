pub mod bookings;
pub mod events;
pub mod locations;
pub mod movies;

use axum::Router;
use std::sync::Arc;
use validator::Validate;

use crate::error::EngineError;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(events::routes())
        .merge(bookings::routes())
        .merge(locations::routes())
        .merge(movies::routes())
}

/// Rejects malformed payloads before they reach the engine.
fn validated<T: Validate>(payload: T) -> Result<T, EngineError> {
    payload
        .validate()
        .map_err(|e| EngineError::InvalidInput(e.to_string()))?;
    Ok(payload)
}
