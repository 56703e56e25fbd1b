//! Admission of proposed events: every check is a hard failure and they run
//! in a fixed order, so the first broken rule is the one reported.

use chrono::NaiveDateTime;
use sqlx::PgConnection;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{Event, Location, TimeWindow};
use crate::services::entitlement::MovieEntitlementGate;
use crate::services::schedule_index;

/// Events are scheduled in whole half-hour slots.
pub const SLOT_SECONDS: i32 = 1800;

#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    pub location_id: Uuid,
    pub start: NaiveDateTime,
    pub duration: i32,
    pub participants: i32,
    pub movie_id: Uuid,
    pub host_id: Uuid,
    /// The event being edited; it never conflicts with itself.
    pub exclude_event: Option<Uuid>,
}

/// A proposal that passed every check, with the location snapshot it was checked against.
#[derive(Debug, Clone)]
pub struct Admission {
    pub location: Location,
    pub window: TimeWindow,
}

pub fn check_duration(duration: i32) -> Result<(), EngineError> {
    if duration < SLOT_SECONDS || duration % SLOT_SECONDS != 0 {
        return Err(EngineError::InvalidDuration(duration));
    }
    Ok(())
}

pub fn check_not_past(start: NaiveDateTime, now: NaiveDateTime) -> Result<(), EngineError> {
    if start < now {
        return Err(EngineError::PastEvent);
    }
    Ok(())
}

pub fn check_location_access(location: &Location, host_id: Uuid) -> Result<(), EngineError> {
    match location.host_id {
        Some(owner) if owner != host_id => Err(EngineError::Forbidden(format!(
            "only the host can organize events at the location {}",
            location.id
        ))),
        _ => Ok(()),
    }
}

/// `open <= start` and `finish <= close` on the same calendar day.
pub fn check_working_hours(location: &Location, window: &TimeWindow) -> Result<(), EngineError> {
    let same_day = window.start.date() == window.finish.date();
    let starts_after_open = location.open <= window.start.time();
    let ends_before_close = window.finish.time() <= location.close;

    if same_day && starts_after_open && ends_before_close {
        Ok(())
    } else {
        Err(EngineError::OutsideWorkingHours {
            open: location.open,
            close: location.close,
        })
    }
}

pub fn check_no_overlap(conflicts: &[Event]) -> Result<(), EngineError> {
    if let Some(existing) = conflicts.first() {
        debug!(
            "Proposal collides with event {} [{} - {})",
            existing.id, existing.start, existing.finish
        );
        return Err(EngineError::LocationOccupied);
    }
    Ok(())
}

pub fn check_participants(participants: i32, capacity: i32) -> Result<(), EngineError> {
    if participants < 1 || participants > capacity {
        return Err(EngineError::InvalidParticipants {
            requested: participants,
            capacity,
        });
    }
    Ok(())
}

/// Entitlement answer fetched before any lock is taken, so the location lock
/// is never held across the catalog call.
pub struct Entitlement {
    movie_id: Uuid,
    host_id: Uuid,
    outcome: Result<bool, EngineError>,
}

impl Entitlement {
    fn answers(&self, request: &AdmissionRequest) -> bool {
        self.movie_id == request.movie_id && self.host_id == request.host_id
    }
}

pub struct EventScheduler {
    gate: Arc<dyn MovieEntitlementGate>,
}

impl EventScheduler {
    pub fn new(gate: Arc<dyn MovieEntitlementGate>) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &Arc<dyn MovieEntitlementGate> {
        &self.gate
    }

    /// Failures are kept and only reported when admission reaches the entitlement step.
    pub async fn resolve_entitlement(&self, movie_id: Uuid, host_id: Uuid) -> Entitlement {
        Entitlement {
            movie_id,
            host_id,
            outcome: self.gate.is_entitled(movie_id, host_id).await,
        }
    }

    /// Runs on the caller's transaction. The caller must hold the location lock
    /// so the overlap check stays valid until commit. The gate is only called here
    /// when `entitlement` is missing or was resolved for another movie or host.
    pub async fn admit(
        &self,
        conn: &mut PgConnection,
        request: &AdmissionRequest,
        now: NaiveDateTime,
        entitlement: Option<Entitlement>,
    ) -> Result<Admission, EngineError> {
        check_duration(request.duration)?;
        check_not_past(request.start, now)?;

        let location = Location::find_in(&mut *conn, request.location_id)
            .await?
            .ok_or(EngineError::LocationNotFound(request.location_id))?;
        check_location_access(&location, request.host_id)?;

        let window = TimeWindow::new(request.start, request.duration)?;
        check_working_hours(&location, &window)?;

        let conflicts =
            schedule_index::overlapping(&mut *conn, location.id, window, request.exclude_event).await?;
        check_no_overlap(&conflicts)?;

        check_participants(request.participants, location.capacity)?;

        let entitled = match entitlement {
            Some(resolved) if resolved.answers(request) => resolved.outcome?,
            _ => self.gate.is_entitled(request.movie_id, request.host_id).await?,
        };
        if !entitled {
            return Err(EngineError::MovieNotEntitled(request.movie_id));
        }

        Ok(Admission { location, window })
    }
}
