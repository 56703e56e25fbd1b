use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "seat_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SeatCategory {
    #[default]
    Unknown,
    Economy,
    Comfort,
    Vip,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub location_id: Uuid,
    pub row: Option<i32>,
    pub number: Option<i32>,
    pub category: SeatCategory,
}

impl Seat {
    /// Blank seat, used when a location is created without a manifest.
    pub fn blank(location_id: Uuid) -> Self {
        Seat {
            id: Uuid::new_v4(),
            location_id,
            row: None,
            number: None,
            category: SeatCategory::Unknown,
        }
    }

    pub async fn for_location(pool: &PgPool, location_id: Uuid) -> Result<Vec<Seat>, sqlx::Error> {
        sqlx::query_as::<_, Seat>(
            "SELECT id, location_id, row, number, category FROM seat
             WHERE location_id = $1
             ORDER BY row NULLS LAST, number NULLS LAST, id"
        )
        .bind(location_id)
        .fetch_all(pool)
        .await
    }

    /// Seats with an EMPTY slot in the event.
    pub async fn vacant_for_event(pool: &PgPool, event_id: Uuid) -> Result<Vec<Seat>, sqlx::Error> {
        sqlx::query_as::<_, Seat>(
            r#"
            SELECT s.id, s.location_id, s.row, s.number, s.category
            FROM seat s
            JOIN booking b ON b.seat_id = s.id
            WHERE b.event_id = $1 AND b.status = 'EMPTY'
            ORDER BY s.row NULLS LAST, s.number NULLS LAST, s.id
            "#
        )
        .bind(event_id)
        .fetch_all(pool)
        .await
    }

    pub async fn ids_for_location(conn: &mut PgConnection, location_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM seat WHERE location_id = $1 ORDER BY row NULLS LAST, number NULLS LAST, id"
        )
        .bind(location_id)
        .fetch_all(conn)
        .await
    }

    pub async fn count_for_location(conn: &mut PgConnection, location_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM seat WHERE location_id = $1")
            .bind(location_id)
            .fetch_one(conn)
            .await
    }

    /// Does the seat belong to the pool of the given location?
    pub async fn belongs_to(conn: &mut PgConnection, seat_id: Uuid, location_id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM seat WHERE id = $1 AND location_id = $2)"
        )
        .bind(seat_id)
        .bind(location_id)
        .fetch_one(conn)
        .await
    }

    pub async fn insert_many(conn: &mut PgConnection, seats: &[Seat]) -> Result<u64, sqlx::Error> {
        if seats.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = seats.iter().map(|s| s.id).collect();
        let locations: Vec<Uuid> = seats.iter().map(|s| s.location_id).collect();
        let rows: Vec<Option<i32>> = seats.iter().map(|s| s.row).collect();
        let numbers: Vec<Option<i32>> = seats.iter().map(|s| s.number).collect();
        let categories: Vec<SeatCategory> = seats.iter().map(|s| s.category).collect();

        sqlx::query(
            r#"
            INSERT INTO seat (id, location_id, row, number, category)
            SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::int4[], $4::int4[], $5::seat_category[])
            "#
        )
        .bind(&ids)
        .bind(&locations)
        .bind(&rows)
        .bind(&numbers)
        .bind(&categories)
        .execute(conn)
        .await
        .map(|r| r.rows_affected())
    }
}
