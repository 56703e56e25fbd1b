use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;

use crate::error::EngineError;
use crate::middleware::AuthUser;
use crate::models::PurchasedMovie;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies/free", get(free_movies))
        .route("/movies/purchased", get(purchased_movies))
}

// GET /api/movies/free
async fn free_movies(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, EngineError> {
    let ids = state.scheduler.gate().free_movies().await?;
    Ok(Json(ids))
}

// GET /api/movies/purchased
async fn purchased_movies(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, EngineError> {
    let movies = PurchasedMovie::purchased_by(&state.db.pool, user.user_id).await?;
    Ok(Json(movies))
}
