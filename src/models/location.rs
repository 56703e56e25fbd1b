use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub coordinates: String,
    pub capacity: i32,
    pub open: NaiveTime,
    pub close: NaiveTime,
    /// `None` means any host may schedule events here.
    pub host_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
}

impl Location {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.host_id == Some(user_id)
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Location>, sqlx::Error> {
        sqlx::query_as::<_, Location>("SELECT * FROM location WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    // Read inside the admission transaction
    pub async fn find_in(conn: &mut PgConnection, id: Uuid) -> Result<Option<Location>, sqlx::Error> {
        sqlx::query_as::<_, Location>("SELECT * FROM location WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn find_for_update(conn: &mut PgConnection, id: Uuid) -> Result<Option<Location>, sqlx::Error> {
        sqlx::query_as::<_, Location>("SELECT * FROM location WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn name_taken(conn: &mut PgConnection, name: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM location WHERE name = $1)")
            .bind(name)
            .fetch_one(conn)
            .await
    }

    pub async fn insert(conn: &mut PgConnection, location: &Location) -> Result<Location, sqlx::Error> {
        sqlx::query_as::<_, Location>(
            r#"
            INSERT INTO location (id, name, coordinates, capacity, open, close, host_id, created_at, modified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#
        )
        .bind(location.id)
        .bind(&location.name)
        .bind(&location.coordinates)
        .bind(location.capacity)
        .bind(location.open)
        .bind(location.close)
        .bind(location.host_id)
        .bind(location.created_at)
        .bind(location.modified_at)
        .fetch_one(conn)
        .await
    }

    pub async fn update(conn: &mut PgConnection, location: &Location) -> Result<Location, sqlx::Error> {
        sqlx::query_as::<_, Location>(
            r#"
            UPDATE location
            SET name = $2, coordinates = $3, capacity = $4, open = $5, close = $6,
                modified_at = (NOW() AT TIME ZONE 'utc')
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(location.id)
        .bind(&location.name)
        .bind(&location.coordinates)
        .bind(location.capacity)
        .bind(location.open)
        .bind(location.close)
        .fetch_one(conn)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query("DELETE FROM location WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }
}
