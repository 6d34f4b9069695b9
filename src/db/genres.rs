use sqlx::PgPool;

use crate::models::Genre;

pub async fn list(pool: &PgPool) -> Result<Vec<Genre>, sqlx::Error> {
    sqlx::query_as::<_, Genre>("SELECT * FROM genres ORDER BY name ASC")
        .fetch_all(pool)
        .await
}
