use chrono::{Datelike, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::EngineError;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub location_id: Uuid,
    pub start: NaiveDateTime,
    /// Seconds.
    pub duration: i32,
    pub finish: NaiveDateTime,
    pub movie_id: Uuid,
    pub host_id: Uuid,
    pub participants: i32,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
}

/// 4713 BC, the lower bound of Postgres `timestamp`. chrono's upper bound is below Postgres'.
const MIN_TIMESTAMP_YEAR: i32 = -4712;

/// Half-open interval `[start, finish)` occupied by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub finish: NaiveDateTime,
}

impl TimeWindow {
    /// Fails for windows Postgres `timestamp` can't store or chrono can't represent.
    pub fn new(start: NaiveDateTime, duration_secs: i32) -> Result<Self, EngineError> {
        let out_of_range = || EngineError::InvalidInput(format!("event start {start} is out of range"));
        if start.year() < MIN_TIMESTAMP_YEAR {
            return Err(out_of_range());
        }
        let finish = start
            .checked_add_signed(Duration::seconds(i64::from(duration_secs)))
            .ok_or_else(out_of_range)?;
        Ok(TimeWindow { start, finish })
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.finish && other.start < self.finish
    }
}

/// Event with the number of seats still open to guests.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EventView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub event: Event,
    pub vacant_seats: i64,
}

const VIEW_SELECT: &str = r#"
    SELECT e.*,
           (SELECT COUNT(*) FROM booking b WHERE b.event_id = e.id AND b.status = 'EMPTY') AS vacant_seats
    FROM event e
"#;

impl Event {
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start,
            finish: self.finish,
        }
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Event>, sqlx::Error> {
        sqlx::query_as::<_, Event>("SELECT * FROM event WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Share lock: blocks while an edit holds the row `FOR UPDATE`, and makes
    /// the edit wait until this transaction ends.
    pub async fn find_for_share(conn: &mut PgConnection, id: Uuid) -> Result<Option<Event>, sqlx::Error> {
        sqlx::query_as::<_, Event>("SELECT * FROM event WHERE id = $1 FOR SHARE")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Row lock serializes concurrent edits of one event.
    pub async fn find_for_update(conn: &mut PgConnection, id: Uuid) -> Result<Option<Event>, sqlx::Error> {
        sqlx::query_as::<_, Event>("SELECT * FROM event WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn upcoming_views(pool: &PgPool, now: NaiveDateTime) -> Result<Vec<EventView>, sqlx::Error> {
        let sql = format!("{VIEW_SELECT} WHERE e.start > $1 ORDER BY e.start");
        sqlx::query_as::<_, EventView>(&sql)
            .bind(now)
            .fetch_all(pool)
            .await
    }

    pub async fn find_view(pool: &PgPool, id: Uuid) -> Result<Option<EventView>, sqlx::Error> {
        let sql = format!("{VIEW_SELECT} WHERE e.id = $1");
        sqlx::query_as::<_, EventView>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn insert(conn: &mut PgConnection, event: &Event) -> Result<Event, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO event (id, name, location_id, start, duration, finish, movie_id, host_id,
                               participants, notes, created_at, modified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(event.location_id)
        .bind(event.start)
        .bind(event.duration)
        .bind(event.finish)
        .bind(event.movie_id)
        .bind(event.host_id)
        .bind(event.participants)
        .bind(&event.notes)
        .bind(event.created_at)
        .bind(event.modified_at)
        .fetch_one(conn)
        .await
    }

    pub async fn update(conn: &mut PgConnection, event: &Event) -> Result<Event, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            UPDATE event
            SET name = $2, location_id = $3, start = $4, duration = $5, finish = $6,
                movie_id = $7, participants = $8, notes = $9,
                modified_at = (NOW() AT TIME ZONE 'utc')
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(event.location_id)
        .bind(event.start)
        .bind(event.duration)
        .bind(event.finish)
        .bind(event.movie_id)
        .bind(event.participants)
        .bind(&event.notes)
        .fetch_one(conn)
        .await
    }

    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query("DELETE FROM event WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await
            .map(|r| r.rows_affected() > 0)
    }
}
