use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Book, BookWithGenre, InventoryCounts};

pub struct BookInput<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub genre_id: Option<Uuid>,
    pub inventory_total_qty: i32,
}

pub async fn list(pool: &PgPool) -> Result<Vec<BookWithGenre>, sqlx::Error> {
    sqlx::query_as::<_, BookWithGenre>(
        "SELECT b.*, g.name AS genre_name FROM books b
         LEFT JOIN genres g ON g.id = b.genre_id
         ORDER BY b.name ASC, b.id ASC",
    )
    .fetch_all(pool)
    .await
}

pub async fn find_by_id<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<BookWithGenre>, sqlx::Error> {
    sqlx::query_as::<_, BookWithGenre>(
        "SELECT b.*, g.name AS genre_name FROM books b
         LEFT JOIN genres g ON g.id = b.genre_id
         WHERE b.id = $1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn create(pool: &PgPool, input: &BookInput<'_>) -> Result<Book, sqlx::Error> {
    sqlx::query_as::<_, Book>(
        "INSERT INTO books (name, description, genre_id, checked_qty, inventory_total_qty)
         VALUES ($1, $2, $3, 0, $4) RETURNING *",
    )
    .bind(input.name)
    .bind(input.description)
    .bind(input.genre_id)
    .bind(input.inventory_total_qty)
    .fetch_one(pool)
    .await
}

pub async fn update<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    input: &BookInput<'_>,
) -> Result<Book, sqlx::Error> {
    sqlx::query_as::<_, Book>(
        "UPDATE books SET name = $2, description = $3, genre_id = $4,
                inventory_total_qty = $5, updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(input.name)
    .bind(input.description)
    .bind(input.genre_id)
    .bind(input.inventory_total_qty)
    .fetch_one(executor)
    .await
}

pub async fn set_cover(pool: &PgPool, id: Uuid, cover: Option<&str>) -> Result<Book, sqlx::Error> {
    sqlx::query_as::<_, Book>(
        "UPDATE books SET cover = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(cover)
    .fetch_one(pool)
    .await
}

/// Read the ledger columns and hold the row lock until the transaction ends.
pub async fn lock_counts<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<InventoryCounts>, sqlx::Error> {
    sqlx::query_as::<_, InventoryCounts>(
        "SELECT id AS book_id, checked_qty, inventory_total_qty
         FROM books WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn set_checked_qty<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    checked_qty: i32,
) -> Result<InventoryCounts, sqlx::Error> {
    sqlx::query_as::<_, InventoryCounts>(
        "UPDATE books SET checked_qty = $2, updated_at = now()
         WHERE id = $1
         RETURNING id AS book_id, checked_qty, inventory_total_qty",
    )
    .bind(id)
    .bind(checked_qty)
    .fetch_one(executor)
    .await
}

/// Deletes the book and every checkout linked to it. Returns the deleted row.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Book>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM checkouts WHERE id IN (
             SELECT checkout_id FROM user_book_checkouts WHERE book_id = $1
         )",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let book = sqlx::query_as::<_, Book>("DELETE FROM books WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(book)
}
