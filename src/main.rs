use anyhow::Context;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use screening_booking::{config::Config, controllers, services::cleanup::CleanupService, AppState};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let database = state.db.ping().await;
    let redis = state.redis.ping().await;
    let status = if database { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(json!({ "database": database, "redis": redis })))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting screening booking API ({})", config.app.environment);

    let app_state = AppState::new(config.clone()).await?;

    // --- Start background tasks ---

    // Releases reservations nobody confirmed in time
    if let Some(cleanup) = CleanupService::new(app_state.clone()) {
        let interval = Duration::from_secs(config.booking.cleanup_interval_seconds.max(1));
        task::spawn(async move {
            loop {
                // Unknown stats still get a sweep attempt
                let stale = cleanup
                    .get_cleanup_stats()
                    .await
                    .map_or(true, |stats| stats.stale_reservations > 0);
                if stale {
                    cleanup.run_cleanup().await;
                }
                tokio::time::sleep(interval).await;
            }
        });
        info!("Reservation expiry enabled");
    } else {
        warn!("RESERVATION_TTL_SECONDS is 0, reservations never expire");
    }

    // --- Start the web server ---

    let app = Router::new()
        .route("/", get(|| async { "Screening booking API v1.0" }))
        .route("/health", get(health))
        .nest("/api", controllers::routes())
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let host: std::net::IpAddr = config
        .app
        .host
        .parse()
        .with_context(|| format!("HOST must be an IP address, got {:?}", config.app.host))?;
    let addr = SocketAddr::from((host, config.app.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app.into_make_service())
        .await
        .context("Server error")?;
    Ok(())
}
