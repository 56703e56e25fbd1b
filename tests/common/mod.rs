#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Days, NaiveDateTime, NaiveTime, Utc};
use fake::faker::company::en::CompanyName;
use fake::Fake;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use screening_booking::database::Database;
use screening_booking::error::EngineError;
use screening_booking::models::Location;
use screening_booking::services::entitlement::MovieEntitlementGate;
use screening_booking::services::events::{EventService, NewEvent};
use screening_booking::services::locations::{LocationService, NewLocation};
use screening_booking::services::scheduler::EventScheduler;

/// Postgres tests run only when TEST_DATABASE_URL points at a scratch database.
pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("TEST_DATABASE_URL is not reachable");
    Database::from_pool(pool.clone())
        .run_migrations()
        .await
        .expect("migrations failed");
    Some(pool)
}

pub struct FakeGate {
    pub entitled: bool,
}

#[async_trait]
impl MovieEntitlementGate for FakeGate {
    async fn is_entitled(&self, _movie_id: Uuid, _host_id: Uuid) -> Result<bool, EngineError> {
        Ok(self.entitled)
    }

    async fn free_movies(&self) -> Result<Vec<Uuid>, EngineError> {
        Ok(vec![])
    }
}

/// Catalog outage: every answer is ServiceUnavailable.
pub struct DownGate;

#[async_trait]
impl MovieEntitlementGate for DownGate {
    async fn is_entitled(&self, _movie_id: Uuid, _host_id: Uuid) -> Result<bool, EngineError> {
        Err(EngineError::ServiceUnavailable("catalog down".to_string()))
    }

    async fn free_movies(&self) -> Result<Vec<Uuid>, EngineError> {
        Err(EngineError::ServiceUnavailable("catalog down".to_string()))
    }
}

/// Entitles everything and counts how often it was asked.
#[derive(Default)]
pub struct CountingGate {
    pub calls: AtomicUsize,
}

impl CountingGate {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MovieEntitlementGate for CountingGate {
    async fn is_entitled(&self, _movie_id: Uuid, _host_id: Uuid) -> Result<bool, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn free_movies(&self) -> Result<Vec<Uuid>, EngineError> {
        Ok(vec![])
    }
}

pub fn event_service(pool: &PgPool) -> EventService {
    event_service_with(pool, Arc::new(FakeGate { entitled: true }))
}

pub fn event_service_with(pool: &PgPool, gate: Arc<dyn MovieEntitlementGate>) -> EventService {
    EventService::new(pool.clone(), Arc::new(EventScheduler::new(gate)))
}

pub fn unique_name() -> String {
    let company: String = CompanyName().fake();
    format!("{company} {}", Uuid::new_v4().simple())
}

/// A week from now, at the given time of day.
pub fn next_week_at(h: u32, m: u32) -> NaiveDateTime {
    let day = Utc::now().date_naive() + Days::new(7);
    day.and_hms_opt(h, m, 0).unwrap()
}

/// Location open 09:00-22:00 with `capacity` blank seats, owned by `owner`.
pub async fn location(pool: &PgPool, capacity: i32, owner: Uuid) -> Location {
    LocationService::new(pool.clone())
        .create_location(
            NewLocation {
                name: unique_name(),
                coordinates: "43.238,76.889".to_string(),
                capacity,
                open: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                close: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
                seats: None,
            },
            owner,
        )
        .await
        .expect("location")
}

pub fn new_event(location_id: Uuid, start: NaiveDateTime, duration: i32, participants: i32) -> NewEvent {
    NewEvent {
        name: unique_name(),
        location_id,
        start,
        duration,
        participants,
        movie_id: Uuid::new_v4(),
        notes: None,
    }
}
