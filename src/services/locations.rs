//! Locations and their seat pools.

use chrono::{NaiveTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{EngineError, UNIQUE_VIOLATION};
use crate::models::{Location, Seat, SeatCategory};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ManifestSeat {
    #[validate(range(min = 1))]
    pub row: Option<i32>,
    #[validate(range(min = 1))]
    pub number: Option<i32>,
    #[serde(default)]
    pub category: SeatCategory,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_new_location"))]
pub struct NewLocation {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 255))]
    pub coordinates: String,
    #[validate(range(min = 1))]
    pub capacity: i32,
    pub open: NaiveTime,
    pub close: NaiveTime,
    #[validate(nested)]
    pub seats: Option<Vec<ManifestSeat>>,
}

fn validate_new_location(location: &NewLocation) -> Result<(), ValidationError> {
    check_hours(location.open, location.close)?;
    if let Some(seats) = &location.seats {
        if seats.len() != usize::try_from(location.capacity).unwrap_or(0) {
            return Err(ValidationError::new("seat_manifest_length"));
        }
    }
    Ok(())
}

fn check_hours(open: NaiveTime, close: NaiveTime) -> Result<(), ValidationError> {
    if open >= close {
        return Err(ValidationError::new("open_before_close"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LocationChanges {
    #[validate(length(max = 255))]
    pub coordinates: Option<String>,
    #[validate(range(min = 1))]
    pub capacity: Option<i32>,
    pub open: Option<NaiveTime>,
    pub close: Option<NaiveTime>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Rename {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

fn check_owner(location: &Location, requester: Uuid) -> Result<(), EngineError> {
    if !location.is_owned_by(requester) {
        return Err(EngineError::Forbidden("only the owner can modify the location".to_string()));
    }
    Ok(())
}

fn duplicate_name(err: sqlx::Error, name: &str) -> EngineError {
    let unique = err
        .as_database_error()
        .and_then(|db_err| db_err.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION);
    if unique {
        EngineError::Conflict(format!("location {name:?} already exists"))
    } else {
        EngineError::Database(err)
    }
}

#[derive(Clone)]
pub struct LocationService {
    pool: PgPool,
}

impl LocationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Without a manifest the location gets `capacity` blank seats.
    pub async fn create_location(&self, request: NewLocation, owner: Uuid) -> Result<Location, EngineError> {
        request
            .validate()
            .map_err(|e| EngineError::InvalidInput(e.to_string()))?;

        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;
        if Location::name_taken(&mut *tx, &request.name).await? {
            return Err(EngineError::Conflict(format!("location {:?} already exists", request.name)));
        }

        let location = Location {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            coordinates: request.coordinates,
            capacity: request.capacity,
            open: request.open,
            close: request.close,
            host_id: Some(owner),
            created_at: now,
            modified_at: now,
        };
        let location = Location::insert(&mut *tx, &location)
            .await
            .map_err(|e| duplicate_name(e, &request.name))?;

        let seats: Vec<Seat> = match request.seats {
            Some(manifest) => manifest
                .into_iter()
                .map(|entry| Seat {
                    id: Uuid::new_v4(),
                    location_id: location.id,
                    row: entry.row,
                    number: entry.number,
                    category: entry.category,
                })
                .collect(),
            None => (0..location.capacity).map(|_| Seat::blank(location.id)).collect(),
        };
        Seat::insert_many(&mut *tx, &seats).await?;
        tx.commit().await.map_err(|e| duplicate_name(e, &location.name))?;

        info!("📍 Location {} ({}) created with {} seats", location.id, location.name, seats.len());
        Ok(location)
    }

    pub async fn get_location(&self, location_id: Uuid) -> Result<Location, EngineError> {
        Location::find(&self.pool, location_id)
            .await?
            .ok_or(EngineError::LocationNotFound(location_id))
    }

    /// Raising capacity adds blank seats. Capacity can't drop below the seats already there.
    pub async fn edit_location(
        &self,
        location_id: Uuid,
        changes: LocationChanges,
        requester: Uuid,
    ) -> Result<Location, EngineError> {
        changes
            .validate()
            .map_err(|e| EngineError::InvalidInput(e.to_string()))?;

        let mut tx = self.pool.begin().await?;
        let mut location = Location::find_for_update(&mut *tx, location_id)
            .await?
            .ok_or(EngineError::LocationNotFound(location_id))?;
        check_owner(&location, requester)?;

        if let Some(coordinates) = changes.coordinates {
            location.coordinates = coordinates;
        }
        if let Some(open) = changes.open {
            location.open = open;
        }
        if let Some(close) = changes.close {
            location.close = close;
        }
        check_hours(location.open, location.close)
            .map_err(|_| EngineError::InvalidInput("open must be before close".to_string()))?;

        let existing = Seat::count_for_location(&mut *tx, location_id).await?;
        if let Some(capacity) = changes.capacity {
            if i64::from(capacity) < existing {
                return Err(EngineError::InvalidInput(format!(
                    "location already has {existing} seats, capacity can't be {capacity}"
                )));
            }
            location.capacity = capacity;
        }

        let missing = i64::from(location.capacity) - existing;
        if missing > 0 {
            let seats: Vec<Seat> = (0..missing).map(|_| Seat::blank(location_id)).collect();
            Seat::insert_many(&mut *tx, &seats).await?;
        }

        let location = Location::update(&mut *tx, &location).await?;
        tx.commit().await?;

        info!("Location {} updated", location_id);
        Ok(location)
    }

    pub async fn rename_location(&self, location_id: Uuid, rename: Rename, requester: Uuid) -> Result<Location, EngineError> {
        rename
            .validate()
            .map_err(|e| EngineError::InvalidInput(e.to_string()))?;

        let mut tx = self.pool.begin().await?;
        let mut location = Location::find_for_update(&mut *tx, location_id)
            .await?
            .ok_or(EngineError::LocationNotFound(location_id))?;
        check_owner(&location, requester)?;

        if location.name == rename.name {
            return Ok(location);
        }
        if Location::name_taken(&mut *tx, &rename.name).await? {
            return Err(EngineError::Conflict(format!("location {:?} already exists", rename.name)));
        }

        location.name = rename.name;
        let location = Location::update(&mut *tx, &location)
            .await
            .map_err(|e| duplicate_name(e, &location.name))?;
        tx.commit().await?;

        info!("Location {} renamed to {}", location_id, location.name);
        Ok(location)
    }

    /// Seats, events and bookings go with it.
    pub async fn delete_location(&self, location_id: Uuid, requester: Uuid) -> Result<(), EngineError> {
        let location = self.get_location(location_id).await?;
        check_owner(&location, requester)?;

        if !Location::delete(&self.pool, location_id).await? {
            return Err(EngineError::LocationNotFound(location_id));
        }
        info!("🗑️ Location {} deleted", location_id);
        Ok(())
    }

    pub async fn list_location_seats(&self, location_id: Uuid) -> Result<Vec<Seat>, EngineError> {
        self.get_location(location_id).await?;
        Ok(Seat::for_location(&self.pool, location_id).await?)
    }
}
