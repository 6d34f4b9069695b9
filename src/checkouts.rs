//! Checkout and return of a single copy, each as one transaction spanning the
//! inventory ledger and the checkout rows. Locks are always taken book row
//! first, then checkout row.

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::inventory;
use crate::models::{CheckoutRecord, InventoryCounts};

#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub record: CheckoutRecord,
    pub counts: InventoryCounts,
}

pub fn validate_due_date(due_date: NaiveDate, today: NaiveDate) -> Result<(), AppError> {
    if due_date < today {
        return Err(AppError::invalid_field(
            "due_date",
            "The due date must be a date after or equal to today.",
        ));
    }
    Ok(())
}

pub async fn checkout_book(
    pool: &PgPool,
    user_id: Uuid,
    book_id: Uuid,
    due_date: NaiveDate,
    today: NaiveDate,
) -> Result<CheckoutOutcome, AppError> {
    validate_due_date(due_date, today)?;

    let mut tx = pool.begin().await?;

    let counts = inventory::checkout(&mut *tx, book_id, 1).await?;
    let checkout = db::checkouts::create(&mut *tx, today, due_date).await?;
    db::checkouts::link(&mut *tx, user_id, book_id, checkout.id).await?;

    tx.commit().await?;

    tracing::info!(
        %user_id,
        %book_id,
        checkout_id = %checkout.id,
        %due_date,
        checked_qty = counts.checked_qty,
        "Book checked out"
    );

    Ok(CheckoutOutcome {
        record: CheckoutRecord {
            id: checkout.id,
            user_id,
            book_id,
            checkout_date: checkout.checkout_date,
            due_date: checkout.due_date,
            checkin_date: checkout.checkin_date,
        },
        counts,
    })
}

/// Closes the earliest open checkout of `book_id` held by `user_id`.
pub async fn return_book(
    pool: &PgPool,
    user_id: Uuid,
    book_id: Uuid,
    today: NaiveDate,
) -> Result<CheckoutOutcome, AppError> {
    let mut tx = pool.begin().await?;

    db::books::lock_counts(&mut *tx, book_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

    let mut record = db::checkouts::lock_earliest_open(&mut *tx, user_id, book_id)
        .await?
        .ok_or(AppError::NoActiveCheckout)?;

    db::checkouts::close(&mut *tx, record.id, today).await?;
    let counts = inventory::checkin(&mut *tx, book_id, 1).await?;

    tx.commit().await?;

    record.checkin_date = Some(today);

    tracing::info!(
        %user_id,
        %book_id,
        checkout_id = %record.id,
        checked_qty = counts.checked_qty,
        "Book returned"
    );

    Ok(CheckoutOutcome { record, counts })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn due_today_is_allowed() {
        assert!(validate_due_date(date("2024-06-01"), date("2024-06-01")).is_ok());
        assert!(validate_due_date(date("2024-06-15"), date("2024-06-01")).is_ok());
    }

    #[test]
    fn due_in_the_past_is_a_validation_error() {
        let err = validate_due_date(date("2024-05-31"), date("2024-06-01")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_, Some(_))));
    }
}
