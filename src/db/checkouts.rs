use chrono::NaiveDate;
use futures_util::stream::BoxStream;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Checkout, CheckoutRecord, OverdueCheckout};

const RECORD_COLUMNS: &str =
    "c.id, j.user_id, j.book_id, c.checkout_date, c.due_date, c.checkin_date";

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    checkout_date: NaiveDate,
    due_date: NaiveDate,
) -> Result<Checkout, sqlx::Error> {
    sqlx::query_as::<_, Checkout>(
        "INSERT INTO checkouts (checkout_date, due_date) VALUES ($1, $2) RETURNING *",
    )
    .bind(checkout_date)
    .bind(due_date)
    .fetch_one(executor)
    .await
}

pub async fn link<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
    book_id: Uuid,
    checkout_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO user_book_checkouts (user_id, book_id, checkout_id) VALUES ($1, $2, $3)",
    )
    .bind(user_id)
    .bind(book_id)
    .bind(checkout_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Earliest open checkout of `book_id` by `user_id`, locked for update.
pub async fn lock_earliest_open<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
    book_id: Uuid,
) -> Result<Option<CheckoutRecord>, sqlx::Error> {
    sqlx::query_as::<_, CheckoutRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM checkouts c
         JOIN user_book_checkouts j ON j.checkout_id = c.id
         WHERE j.user_id = $1 AND j.book_id = $2 AND c.checkin_date IS NULL
         ORDER BY c.checkout_date ASC, c.created_at ASC, c.id ASC
         LIMIT 1
         FOR UPDATE OF c"
    ))
    .bind(user_id)
    .bind(book_id)
    .fetch_optional(executor)
    .await
}

pub async fn close<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    checkin_date: NaiveDate,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE checkouts SET checkin_date = $2 WHERE id = $1 AND checkin_date IS NULL")
        .bind(id)
        .bind(checkin_date)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn open_for_book(pool: &PgPool, book_id: Uuid) -> Result<Vec<CheckoutRecord>, sqlx::Error> {
    sqlx::query_as::<_, CheckoutRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM checkouts c
         JOIN user_book_checkouts j ON j.checkout_id = c.id
         WHERE j.book_id = $1 AND c.checkin_date IS NULL
         ORDER BY c.due_date ASC, c.id ASC"
    ))
    .bind(book_id)
    .fetch_all(pool)
    .await
}

pub async fn open_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<CheckoutRecord>, sqlx::Error> {
    sqlx::query_as::<_, CheckoutRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM checkouts c
         JOIN user_book_checkouts j ON j.checkout_id = c.id
         WHERE j.user_id = $1 AND c.checkin_date IS NULL
         ORDER BY c.due_date ASC, c.id ASC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// All checkouts of a book, returned or not, newest first.
pub async fn history_for_book(
    pool: &PgPool,
    book_id: Uuid,
) -> Result<Vec<CheckoutRecord>, sqlx::Error> {
    sqlx::query_as::<_, CheckoutRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM checkouts c
         JOIN user_book_checkouts j ON j.checkout_id = c.id
         WHERE j.book_id = $1
         ORDER BY c.checkout_date DESC, c.created_at DESC"
    ))
    .bind(book_id)
    .fetch_all(pool)
    .await
}

/// Open checkouts due on or before `as_of`, streamed row by row.
pub fn overdue(pool: &PgPool, as_of: NaiveDate) -> BoxStream<'_, Result<OverdueCheckout, sqlx::Error>> {
    sqlx::query_as::<_, OverdueCheckout>(
        "SELECT c.id AS checkout_id, c.checkout_date, c.due_date,
                u.id AS user_id, u.name AS user_name, u.email AS user_email,
                b.id AS book_id, b.name AS book_name
         FROM checkouts c
         JOIN user_book_checkouts j ON j.checkout_id = c.id
         JOIN users u ON u.id = j.user_id
         JOIN books b ON b.id = j.book_id
         WHERE c.checkin_date IS NULL AND c.due_date <= $1
         ORDER BY c.due_date ASC, c.id ASC",
    )
    .bind(as_of)
    .fetch(pool)
}
