use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PurchasedMovie {
    pub movie_id: Uuid,
    pub movie_name: String,
    pub release_date: Option<NaiveDate>,
}

impl PurchasedMovie {
    pub async fn purchased_by(pool: &PgPool, host_id: Uuid) -> Result<Vec<PurchasedMovie>, sqlx::Error> {
        sqlx::query_as::<_, PurchasedMovie>(
            r#"
            SELECT m.movie_id, m.movie_name, m.release_date
            FROM purchased_movie m
            JOIN purchased_movie_host h ON h.movie_id = m.movie_id
            WHERE h.host_id = $1
            ORDER BY m.movie_name
            "#
        )
        .bind(host_id)
        .fetch_all(pool)
        .await
    }

    pub async fn is_purchased_by(pool: &PgPool, movie_id: Uuid, host_id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM purchased_movie_host WHERE movie_id = $1 AND host_id = $2)"
        )
        .bind(movie_id)
        .bind(host_id)
        .fetch_one(pool)
        .await
    }
}
