//! Event lifecycle. Admission, seat allocation and slot creation for one event
//! commit in a single transaction that holds the location lock.

use chrono::{NaiveDateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{translate_schedule_conflict, translate_seat_conflict, EngineError};
use crate::models::{Booking, Event, EventView, Seat, TimeWindow};
use crate::services::allocator;
use crate::services::schedule_index;
use crate::services::scheduler::{AdmissionRequest, EventScheduler};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewEvent {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub location_id: Uuid,
    pub start: NaiveDateTime,
    pub duration: i32,
    pub participants: i32,
    pub movie_id: Uuid,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Fields left out keep their current value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EventChanges {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub location_id: Option<Uuid>,
    pub start: Option<NaiveDateTime>,
    pub duration: Option<i32>,
    pub participants: Option<i32>,
    pub movie_id: Option<Uuid>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl EventChanges {
    fn apply(&self, current: &Event) -> Result<Event, EngineError> {
        let mut next = current.clone();
        if let Some(name) = &self.name {
            next.name = name.clone();
        }
        if let Some(location_id) = self.location_id {
            next.location_id = location_id;
        }
        if let Some(start) = self.start {
            next.start = start;
        }
        if let Some(duration) = self.duration {
            next.duration = duration;
        }
        if let Some(participants) = self.participants {
            next.participants = participants;
        }
        if let Some(movie_id) = self.movie_id {
            next.movie_id = movie_id;
        }
        if self.notes.is_some() {
            next.notes = self.notes.clone();
        }
        next.finish = TimeWindow::new(next.start, next.duration)?.finish;
        Ok(next)
    }
}

/// Both locations of a move are locked in a fixed order.
fn lock_order(a: Uuid, b: Uuid) -> Vec<Uuid> {
    let mut ids = vec![a, b];
    ids.sort();
    ids.dedup();
    ids
}

fn check_host(event: &Event, requester: Uuid) -> Result<(), EngineError> {
    if event.host_id != requester {
        return Err(EngineError::Forbidden("only the host can modify the event".to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct EventService {
    pool: PgPool,
    scheduler: Arc<EventScheduler>,
}

impl EventService {
    pub fn new(pool: PgPool, scheduler: Arc<EventScheduler>) -> Self {
        Self { pool, scheduler }
    }

    pub async fn create_event(&self, request: NewEvent, host_id: Uuid) -> Result<Event, EngineError> {
        let now = Utc::now().naive_utc();
        let entitlement = self.scheduler.resolve_entitlement(request.movie_id, host_id).await;

        let mut tx = self.pool.begin().await?;
        schedule_index::lock_location(&mut *tx, request.location_id).await?;

        let admission = self
            .scheduler
            .admit(
                &mut *tx,
                &AdmissionRequest {
                    location_id: request.location_id,
                    start: request.start,
                    duration: request.duration,
                    participants: request.participants,
                    movie_id: request.movie_id,
                    host_id,
                    exclude_event: None,
                },
                now,
                Some(entitlement),
            )
            .await?;

        let seats = allocator::allocate(
            &mut *tx,
            admission.location.id,
            admission.window,
            request.participants,
            None,
        )
        .await?;

        let event = Event {
            id: Uuid::new_v4(),
            name: request.name,
            location_id: admission.location.id,
            start: admission.window.start,
            duration: request.duration,
            finish: admission.window.finish,
            movie_id: request.movie_id,
            host_id,
            participants: request.participants,
            notes: request.notes,
            created_at: now,
            modified_at: now,
        };
        let event = Event::insert(&mut *tx, &event)
            .await
            .map_err(translate_schedule_conflict)?;

        open_location_slots(&mut *tx, event.id, event.location_id).await?;
        grant_all(&mut *tx, event.id, &seats, host_id).await?;

        tx.commit().await.map_err(translate_schedule_conflict)?;

        info!(
            "🎬 Event {} admitted at location {} ({} seats held by host)",
            event.id,
            event.location_id,
            seats.len()
        );
        Ok(event)
    }

    pub async fn edit_event(
        &self,
        event_id: Uuid,
        changes: EventChanges,
        requester: Uuid,
    ) -> Result<Event, EngineError> {
        let now = Utc::now().naive_utc();

        let peek = Event::find(&self.pool, event_id)
            .await?
            .ok_or(EngineError::EventNotFound(event_id))?;
        check_host(&peek, requester)?;
        let target_location = changes.location_id.unwrap_or(peek.location_id);
        let entitlement = self
            .scheduler
            .resolve_entitlement(changes.movie_id.unwrap_or(peek.movie_id), peek.host_id)
            .await;

        let mut tx = self.pool.begin().await?;

        for location_id in lock_order(peek.location_id, target_location) {
            schedule_index::lock_location(&mut *tx, location_id).await?;
        }

        let current = Event::find_for_update(&mut *tx, event_id)
            .await?
            .ok_or(EngineError::EventNotFound(event_id))?;
        if current.location_id != peek.location_id {
            return Err(EngineError::Conflict("event was moved concurrently, retry".to_string()));
        }

        let next = changes.apply(&current)?;
        let admission = self
            .scheduler
            .admit(
                &mut *tx,
                &AdmissionRequest {
                    location_id: next.location_id,
                    start: next.start,
                    duration: next.duration,
                    participants: next.participants,
                    movie_id: next.movie_id,
                    host_id: current.host_id,
                    exclude_event: Some(event_id),
                },
                now,
                Some(entitlement),
            )
            .await?;

        let moved = next.location_id != current.location_id;
        if moved && Booking::has_guest_holds(&mut *tx, event_id, current.host_id).await? {
            return Err(EngineError::InvalidState(
                "guests already hold seats, the event can't change location".to_string(),
            ));
        }

        let updated = Event::update(&mut *tx, &next)
            .await
            .map_err(translate_schedule_conflict)?;

        if moved {
            Booking::delete_for_event(&mut *tx, event_id).await?;
            open_location_slots(&mut *tx, event_id, updated.location_id).await?;
            let seats = allocator::allocate(
                &mut *tx,
                updated.location_id,
                admission.window,
                updated.participants,
                Some(event_id),
            )
            .await?;
            grant_all(&mut *tx, event_id, &seats, current.host_id).await?;
        } else {
            resize_host_grant(&mut *tx, &updated, admission.window).await?;
        }

        tx.commit().await.map_err(translate_schedule_conflict)?;

        info!("✏️ Event {} updated by host {}", event_id, requester);
        Ok(updated)
    }

    pub async fn delete_event(&self, event_id: Uuid, requester: Uuid) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await?;
        let event = Event::find_for_update(&mut *tx, event_id)
            .await?
            .ok_or(EngineError::EventNotFound(event_id))?;
        check_host(&event, requester)?;

        if !Event::delete(&mut *tx, event_id).await? {
            warn!("Event {} vanished before delete", event_id);
            return Err(EngineError::EventNotFound(event_id));
        }
        tx.commit().await?;

        info!("🗑️ Event {} deleted by host {}", event_id, requester);
        Ok(())
    }

    /// Events that have not started yet, soonest first.
    pub async fn list_events(&self) -> Result<Vec<EventView>, EngineError> {
        let now = Utc::now().naive_utc();
        Ok(Event::upcoming_views(&self.pool, now).await?)
    }

    pub async fn get_event(&self, event_id: Uuid) -> Result<(EventView, Vec<Seat>), EngineError> {
        let view = Event::find_view(&self.pool, event_id)
            .await?
            .ok_or(EngineError::EventNotFound(event_id))?;
        let vacant = Seat::vacant_for_event(&self.pool, event_id).await?;
        Ok((view, vacant))
    }
}

async fn open_location_slots(conn: &mut PgConnection, event_id: Uuid, location_id: Uuid) -> Result<(), EngineError> {
    let seat_ids = Seat::ids_for_location(&mut *conn, location_id).await?;
    Booking::open_slots(&mut *conn, event_id, &seat_ids)
        .await
        .map_err(translate_seat_conflict)?;
    Ok(())
}

async fn grant_all(conn: &mut PgConnection, event_id: Uuid, seats: &[Uuid], host_id: Uuid) -> Result<(), EngineError> {
    let granted = Booking::grant(conn, event_id, seats, host_id).await?;
    if granted != seats.len() as u64 {
        return Err(EngineError::SeatAlreadyTaken);
    }
    Ok(())
}

/// Brings the number of host-held seats in line with `participants`.
async fn resize_host_grant(
    conn: &mut PgConnection,
    event: &Event,
    window: TimeWindow,
) -> Result<(), EngineError> {
    let held = Booking::count_granted(&mut *conn, event.id, event.host_id).await?;
    let wanted = i64::from(event.participants);

    if wanted > held {
        // Seats added to the location after the event was created have no slot yet.
        open_location_slots(&mut *conn, event.id, event.location_id).await?;
        let extra = i32::try_from(wanted - held).unwrap_or(i32::MAX);
        let seats = allocator::allocate(&mut *conn, event.location_id, window, extra, Some(event.id)).await?;
        grant_all(&mut *conn, event.id, &seats, event.host_id).await?;
    } else if wanted < held {
        Booking::release_granted(&mut *conn, event.id, event.host_id, held - wanted).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn event() -> Event {
        let start = NaiveDate::from_ymd_opt(2031, 5, 1)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        Event {
            id: Uuid::new_v4(),
            name: "Night screening".to_string(),
            location_id: Uuid::new_v4(),
            start,
            duration: 3600,
            finish: start + chrono::Duration::seconds(3600),
            movie_id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            participants: 4,
            notes: None,
            created_at: start,
            modified_at: start,
        }
    }

    #[test]
    fn changes_recompute_the_finish() {
        let current = event();
        let changes = EventChanges {
            duration: Some(5400),
            participants: Some(2),
            ..Default::default()
        };
        let next = changes.apply(&current).unwrap();
        assert_eq!(next.finish, current.start + chrono::Duration::seconds(5400));
        assert_eq!(next.participants, 2);
        assert_eq!(next.name, current.name);
        assert_eq!(next.location_id, current.location_id);
    }

    #[test]
    fn moving_the_start_moves_the_finish() {
        let current = event();
        let later = current.start + chrono::Duration::hours(2);
        let changes = EventChanges {
            start: Some(later),
            ..Default::default()
        };
        let next = changes.apply(&current).unwrap();
        assert_eq!(next.start, later);
        assert_eq!(next.finish, later + chrono::Duration::seconds(3600));
    }

    #[test]
    fn unrepresentable_finish_is_invalid_input() {
        let current = event();
        let changes = EventChanges {
            start: Some(NaiveDateTime::MAX),
            ..Default::default()
        };
        assert!(matches!(changes.apply(&current), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn locations_are_locked_in_a_stable_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(lock_order(a, b), lock_order(b, a));
        assert_eq!(lock_order(a, a), vec![a]);
    }

    #[test]
    fn only_the_host_may_modify() {
        let event = event();
        assert!(check_host(&event, event.host_id).is_ok());
        assert!(matches!(check_host(&event, Uuid::new_v4()), Err(EngineError::Forbidden(_))));
    }

    #[test]
    fn empty_names_are_rejected() {
        let changes = EventChanges {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(changes.validate().is_err());
    }
}
