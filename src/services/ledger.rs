//! Per-seat booking state: EMPTY -> RESERVED -> BOOKED, and back to EMPTY on cancel.
//! Every write is a conditional update, so two requests racing for the same row
//! can never both win.

use chrono::{NaiveDateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{translate_seat_conflict, EngineError};
use crate::models::booking::Transition;
use crate::models::{Booking, BookingDetails, BookingStatus, Event, Seat};

#[derive(Clone)]
pub struct BookingLedger {
    pool: PgPool,
}

/// Only the holder may touch a held row. EMPTY rows are reported as such before ownership.
fn check_holder(booking: &Booking, requester: Uuid) -> Result<(), EngineError> {
    if !booking.status.is_held() {
        return Err(EngineError::InvalidState("the seat is not held by anyone".to_string()));
    }
    if booking.guest_id != Some(requester) {
        return Err(EngineError::Forbidden("booking belongs to someone else".to_string()));
    }
    Ok(())
}

fn check_reader(details: &BookingDetails, requester: Uuid) -> Result<(), EngineError> {
    if details.guest_id == Some(requester) || details.event_host_id == requester {
        return Ok(());
    }
    Err(EngineError::Forbidden("booking belongs to someone else".to_string()))
}

impl BookingLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn reserve(&self, event_id: Uuid, seat_id: Uuid, guest_id: Uuid) -> Result<Booking, EngineError> {
        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;
        let booking = reserve_in(&mut *tx, event_id, seat_id, guest_id, now).await?;
        tx.commit().await.map_err(translate_seat_conflict)?;

        info!("Seat {} reserved for event {} by {}", seat_id, event_id, guest_id);
        Ok(booking)
    }

    pub async fn set_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
        requester: Uuid,
    ) -> Result<Booking, EngineError> {
        let mut tx = self.pool.begin().await?;
        let booking = change_status_in(&mut *tx, booking_id, status, requester).await?;
        tx.commit().await?;

        debug!("Booking {} is now {:?}", booking_id, booking.status);
        Ok(booking)
    }

    /// Cancelling an EMPTY row is an error, so a second cancel never frees anything.
    pub async fn cancel(&self, booking_id: Uuid, requester: Uuid) -> Result<Booking, EngineError> {
        let booking = self.set_status(booking_id, BookingStatus::Empty, requester).await?;
        info!("Booking {} cancelled by {}", booking_id, requester);
        Ok(booking)
    }

    pub async fn get(&self, booking_id: Uuid, requester: Uuid) -> Result<BookingDetails, EngineError> {
        let details = Booking::find_details(&self.pool, booking_id)
            .await?
            .ok_or(EngineError::BookingNotFound(booking_id))?;
        check_reader(&details, requester)?;
        Ok(details)
    }

    pub async fn list_for_guest(&self, guest_id: Uuid) -> Result<Vec<BookingDetails>, EngineError> {
        Ok(Booking::details_for_guest(&self.pool, guest_id).await?)
    }

    /// Whole seat map of an event, EMPTY slots included. Host only.
    pub async fn list_for_event(&self, event_id: Uuid, requester: Uuid) -> Result<Vec<BookingDetails>, EngineError> {
        let event = Event::find(&self.pool, event_id)
            .await?
            .ok_or(EngineError::EventNotFound(event_id))?;
        if event.host_id != requester {
            return Err(EngineError::Forbidden("only the host can list the event's bookings".to_string()));
        }
        Ok(Booking::details_for_event(&self.pool, event_id).await?)
    }
}

async fn reserve_in(
    conn: &mut PgConnection,
    event_id: Uuid,
    seat_id: Uuid,
    guest_id: Uuid,
    now: NaiveDateTime,
) -> Result<Booking, EngineError> {
    // Held until commit, so a concurrent edit can't move the event and drop the new hold.
    let event = Event::find_for_share(&mut *conn, event_id)
        .await?
        .ok_or(EngineError::EventNotFound(event_id))?;
    if event.start <= now {
        return Err(EngineError::PastEvent);
    }
    if !Seat::belongs_to(&mut *conn, seat_id, event.location_id).await? {
        return Err(EngineError::SeatNotFound(seat_id));
    }

    Booking::ensure_slot(&mut *conn, event_id, seat_id)
        .await
        .map_err(translate_seat_conflict)?;

    Booking::claim(&mut *conn, event_id, seat_id, guest_id)
        .await
        .map_err(translate_seat_conflict)?
        .ok_or(EngineError::SeatAlreadyTaken)
}

async fn change_status_in(
    conn: &mut PgConnection,
    booking_id: Uuid,
    target: BookingStatus,
    requester: Uuid,
) -> Result<Booking, EngineError> {
    let current = Booking::find(&mut *conn, booking_id)
        .await?
        .ok_or(EngineError::BookingNotFound(booking_id))?;
    check_holder(&current, requester)?;

    let updated = match current.status.transition_to(target)? {
        Transition::Unchanged => return Ok(current),
        Transition::Advance { from, to } => Booking::advance(&mut *conn, booking_id, requester, from, to).await?,
        Transition::Release => Booking::release(&mut *conn, booking_id, requester).await?,
    };

    match updated {
        Some(booking) => Ok(booking),
        // Lost a race with another writer; report against what is there now.
        None => {
            let latest = Booking::find(&mut *conn, booking_id)
                .await?
                .ok_or(EngineError::BookingNotFound(booking_id))?;
            check_holder(&latest, requester)?;
            latest.status.transition_to(target)?;
            Err(EngineError::InvalidState(format!(
                "booking changed concurrently, now {:?}",
                latest.status
            )))
        }
    }
}
