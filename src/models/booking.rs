use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::SeatCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Empty,
    Reserved,
    Booked,
}

/// Outcome of a requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Already in the requested state.
    Unchanged,
    Advance { from: BookingStatus, to: BookingStatus },
    Release,
}

impl BookingStatus {
    pub fn is_held(&self) -> bool {
        !matches!(self, BookingStatus::Empty)
    }

    /// EMPTY -> RESERVED -> BOOKED, anything held -> EMPTY.
    /// EMPTY -> RESERVED only happens through `reserve`, never through a status update.
    pub fn transition_to(self, target: BookingStatus) -> Result<Transition, EngineError> {
        use BookingStatus::*;
        match (self, target) {
            (Empty, _) => Err(EngineError::InvalidState(
                "the seat is not held by anyone".to_string(),
            )),
            (from, to) if from == to => Ok(Transition::Unchanged),
            (Reserved, Booked) => Ok(Transition::Advance { from: Reserved, to: Booked }),
            (_, Empty) => Ok(Transition::Release),
            (Booked, Reserved) => Err(EngineError::InvalidState(
                "a booked seat can't go back to reserved".to_string(),
            )),
            (from, to) => Err(EngineError::InvalidState(format!(
                "can't move booking from {:?} to {:?}",
                from, to
            ))),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub event_id: Uuid,
    pub seat_id: Uuid,
    pub guest_id: Option<Uuid>,
    pub status: BookingStatus,
    pub price: f64,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
}

/// Booking joined with its event and seat, for display.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BookingDetails {
    pub id: Uuid,
    pub status: BookingStatus,
    pub price: f64,
    pub guest_id: Option<Uuid>,
    pub event_id: Uuid,
    pub event_name: String,
    pub event_start: NaiveDateTime,
    pub event_duration: i32,
    #[serde(skip)]
    pub event_host_id: Uuid,
    pub seat_id: Uuid,
    pub seat_row: Option<i32>,
    pub seat_number: Option<i32>,
    pub seat_category: SeatCategory,
}

const DETAILS_SELECT: &str = r#"
    SELECT b.id, b.status, b.price, b.guest_id,
           e.id AS event_id, e.name AS event_name, e.start AS event_start,
           e.duration AS event_duration, e.host_id AS event_host_id,
           s.id AS seat_id, s.row AS seat_row, s.number AS seat_number, s.category AS seat_category
    FROM booking b
    JOIN event e ON e.id = b.event_id
    JOIN seat s ON s.id = b.seat_id
"#;

impl Booking {
    pub async fn find(conn: &mut PgConnection, id: Uuid) -> Result<Option<Booking>, sqlx::Error> {
        sqlx::query_as::<_, Booking>("SELECT * FROM booking WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn find_details(pool: &PgPool, id: Uuid) -> Result<Option<BookingDetails>, sqlx::Error> {
        let sql = format!("{DETAILS_SELECT} WHERE b.id = $1");
        sqlx::query_as::<_, BookingDetails>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn details_for_guest(pool: &PgPool, guest_id: Uuid) -> Result<Vec<BookingDetails>, sqlx::Error> {
        let sql = format!("{DETAILS_SELECT} WHERE b.guest_id = $1 ORDER BY e.start, s.row, s.number");
        sqlx::query_as::<_, BookingDetails>(&sql)
        .bind(guest_id)
        .fetch_all(pool)
        .await
    }

    pub async fn details_for_event(pool: &PgPool, event_id: Uuid) -> Result<Vec<BookingDetails>, sqlx::Error> {
        let sql = format!(
            "{DETAILS_SELECT} WHERE b.event_id = $1 ORDER BY s.row NULLS LAST, s.number NULLS LAST, s.id"
        );
        sqlx::query_as::<_, BookingDetails>(&sql)
        .bind(event_id)
        .fetch_all(pool)
        .await
    }

    /// One EMPTY row per seat. Existing rows are left alone.
    pub async fn open_slots(conn: &mut PgConnection, event_id: Uuid, seat_ids: &[Uuid]) -> Result<u64, sqlx::Error> {
        if seat_ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<Uuid> = seat_ids.iter().map(|_| Uuid::new_v4()).collect();
        sqlx::query(
            r#"
            INSERT INTO booking (id, event_id, seat_id, status)
            SELECT slot.id, $1, slot.seat_id, 'EMPTY'
            FROM UNNEST($2::uuid[], $3::uuid[]) AS slot(id, seat_id)
            ON CONFLICT (event_id, seat_id) DO NOTHING
            "#
        )
        .bind(event_id)
        .bind(&ids)
        .bind(seat_ids)
        .execute(conn)
        .await
        .map(|r| r.rows_affected())
    }

    pub async fn ensure_slot(conn: &mut PgConnection, event_id: Uuid, seat_id: Uuid) -> Result<(), sqlx::Error> {
        Self::open_slots(conn, event_id, &[seat_id]).await.map(|_| ())
    }

    /// Hands EMPTY slots to `holder` as BOOKED. Returns how many rows actually moved.
    pub async fn grant(
        conn: &mut PgConnection,
        event_id: Uuid,
        seat_ids: &[Uuid],
        holder: Uuid,
    ) -> Result<u64, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE booking
            SET status = 'BOOKED', guest_id = $3, modified_at = (NOW() AT TIME ZONE 'utc')
            WHERE event_id = $1 AND seat_id = ANY($2) AND status = 'EMPTY'
            "#
        )
        .bind(event_id)
        .bind(seat_ids)
        .bind(holder)
        .execute(conn)
        .await
        .map(|r| r.rows_affected())
    }

    /// The only path from EMPTY to RESERVED. `None` means the slot was not EMPTY.
    pub async fn claim(
        conn: &mut PgConnection,
        event_id: Uuid,
        seat_id: Uuid,
        guest_id: Uuid,
    ) -> Result<Option<Booking>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(
            r#"
            UPDATE booking
            SET status = 'RESERVED', guest_id = $3, modified_at = (NOW() AT TIME ZONE 'utc')
            WHERE event_id = $1 AND seat_id = $2 AND status = 'EMPTY'
            RETURNING *
            "#
        )
        .bind(event_id)
        .bind(seat_id)
        .bind(guest_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn advance(
        conn: &mut PgConnection,
        id: Uuid,
        holder: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Option<Booking>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(
            r#"
            UPDATE booking
            SET status = $4, modified_at = (NOW() AT TIME ZONE 'utc')
            WHERE id = $1 AND guest_id = $2 AND status = $3
            RETURNING *
            "#
        )
        .bind(id)
        .bind(holder)
        .bind(from)
        .bind(to)
        .fetch_optional(conn)
        .await
    }

    pub async fn release(conn: &mut PgConnection, id: Uuid, holder: Uuid) -> Result<Option<Booking>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(
            r#"
            UPDATE booking
            SET status = 'EMPTY', guest_id = NULL, modified_at = (NOW() AT TIME ZONE 'utc')
            WHERE id = $1 AND guest_id = $2 AND status <> 'EMPTY'
            RETURNING *
            "#
        )
        .bind(id)
        .bind(holder)
        .fetch_optional(conn)
        .await
    }

    pub async fn count_granted(conn: &mut PgConnection, event_id: Uuid, holder: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM booking WHERE event_id = $1 AND guest_id = $2 AND status = 'BOOKED'"
        )
        .bind(event_id)
        .bind(holder)
        .fetch_one(conn)
        .await
    }

    /// Frees `count` of the holder's BOOKED seats, last seats in row-major order first.
    pub async fn release_granted(
        conn: &mut PgConnection,
        event_id: Uuid,
        holder: Uuid,
        count: i64,
    ) -> Result<u64, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE booking
            SET status = 'EMPTY', guest_id = NULL, modified_at = (NOW() AT TIME ZONE 'utc')
            WHERE id IN (
                SELECT b.id FROM booking b
                JOIN seat s ON s.id = b.seat_id
                WHERE b.event_id = $1 AND b.guest_id = $2 AND b.status = 'BOOKED'
                ORDER BY s.row DESC NULLS FIRST, s.number DESC NULLS FIRST, s.id DESC
                LIMIT $3
                FOR UPDATE OF b
            )
            "#
        )
        .bind(event_id)
        .bind(holder)
        .bind(count)
        .execute(conn)
        .await
        .map(|r| r.rows_affected())
    }

    /// Anyone other than `host_id` holding a seat of the event.
    pub async fn has_guest_holds(conn: &mut PgConnection, event_id: Uuid, host_id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM booking WHERE event_id = $1 AND status <> 'EMPTY' AND guest_id <> $2)"
        )
        .bind(event_id)
        .bind(host_id)
        .fetch_one(conn)
        .await
    }

    pub async fn delete_for_event(conn: &mut PgConnection, event_id: Uuid) -> Result<u64, sqlx::Error> {
        sqlx::query("DELETE FROM booking WHERE event_id = $1")
            .bind(event_id)
            .execute(conn)
            .await
            .map(|r| r.rows_affected())
    }

    /// Releases RESERVED rows untouched since `older_than`. Returns the affected event ids.
    pub async fn release_stale_reservations(
        pool: &PgPool,
        older_than: NaiveDateTime,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE booking
            SET status = 'EMPTY', guest_id = NULL, modified_at = (NOW() AT TIME ZONE 'utc')
            WHERE status = 'RESERVED' AND modified_at < $1
            RETURNING event_id
            "#
        )
        .bind(older_than)
        .fetch_all(pool)
        .await
    }

    pub async fn count_stale_reservations(pool: &PgPool, older_than: NaiveDateTime) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM booking WHERE status = 'RESERVED' AND modified_at < $1"
        )
        .bind(older_than)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BookingStatus::*;

    #[test]
    fn reserved_can_be_confirmed() {
        assert_eq!(
            Reserved.transition_to(Booked).unwrap(),
            Transition::Advance { from: Reserved, to: Booked }
        );
    }

    #[test]
    fn held_seats_can_be_released() {
        assert_eq!(Reserved.transition_to(Empty).unwrap(), Transition::Release);
        assert_eq!(Booked.transition_to(Empty).unwrap(), Transition::Release);
    }

    #[test]
    fn same_status_is_a_no_op() {
        assert_eq!(Booked.transition_to(Booked).unwrap(), Transition::Unchanged);
        assert_eq!(Reserved.transition_to(Reserved).unwrap(), Transition::Unchanged);
    }

    #[test]
    fn empty_and_backwards_moves_are_rejected() {
        for target in [Empty, Reserved, Booked] {
            assert!(matches!(
                Empty.transition_to(target),
                Err(EngineError::InvalidState(_))
            ));
        }
        assert!(matches!(
            Booked.transition_to(Reserved),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn status_serializes_in_upper_case() {
        assert_eq!(serde_json::to_string(&Reserved).unwrap(), "\"RESERVED\"");
        let parsed: BookingStatus = serde_json::from_str("\"BOOKED\"").unwrap();
        assert_eq!(parsed, Booked);
    }
}
