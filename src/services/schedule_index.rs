use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::{Event, TimeWindow};

/// Serializes admissions per location until the surrounding transaction ends.
/// Different locations hash to different keys and never wait on each other.
pub async fn lock_location(conn: &mut PgConnection, location_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(location_id.to_string())
        .execute(conn)
        .await
        .map(|_| ())
}

/// Events at the location whose `[start, finish)` intersects `window`.
pub async fn overlapping(
    conn: &mut PgConnection,
    location_id: Uuid,
    window: TimeWindow,
    exclude_event: Option<Uuid>,
) -> Result<Vec<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        r#"
        SELECT * FROM event
        WHERE location_id = $1
          AND start < $3
          AND $2 < finish
          AND ($4::uuid IS NULL OR id <> $4)
        ORDER BY start
        "#
    )
    .bind(location_id)
    .bind(window.start)
    .bind(window.finish)
    .bind(exclude_event)
    .fetch_all(conn)
    .await
}
