pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;

use anyhow::Context;
use std::sync::Arc;

use services::entitlement::{HttpEntitlementGate, MovieEntitlementGate};
use services::events::EventService;
use services::ledger::BookingLedger;
use services::locations::LocationService;
use services::scheduler::EventScheduler;

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub redis: redis_client::RedisClient,
    pub cache: cache::CacheService,
    pub config: config::Config,
    pub scheduler: Arc<EventScheduler>,
    pub events: EventService,
    pub ledger: BookingLedger,
    pub locations: LocationService,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size)
            .await
            .context("Failed to connect to database")?;
        tracing::info!("Database connected");

        db.run_migrations().await.context("Failed to run migrations")?;

        let redis = redis_client::RedisClient::new(&config.redis.url)
            .await
            .context("Failed to connect to Redis")?;
        tracing::info!("Redis connected");

        let cache = cache::CacheService::new(redis.clone());

        let gate: Arc<dyn MovieEntitlementGate> = Arc::new(
            HttpEntitlementGate::from_config(
                &config.entitlement,
                &config.circuit_breaker,
                db.pool.clone(),
                Some(cache.clone()),
            )
            .context("Failed to build free movie client")?,
        );
        let scheduler = Arc::new(EventScheduler::new(gate));

        Ok(Arc::new(Self {
            events: EventService::new(db.pool.clone(), scheduler.clone()),
            ledger: BookingLedger::new(db.pool.clone()),
            locations: LocationService::new(db.pool.clone()),
            db,
            redis,
            cache,
            config,
            scheduler,
        }))
    }
}
