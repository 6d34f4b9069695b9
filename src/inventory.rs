//! Per-book inventory ledger.
//!
//! Every mutation reads the counts with `SELECT ... FOR UPDATE` on the
//! caller's transaction, so concurrent checkouts and returns of the same book
//! are serialized and roll back with the caller. The table's CHECK constraint
//! backs the same `0 <= checked_qty <= inventory_total_qty` invariant.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::models::InventoryCounts;

/// Counts after lending `quantity` more copies, or `InventoryExceeded`.
pub fn plan_checkout(counts: InventoryCounts, quantity: i32) -> Result<InventoryCounts, AppError> {
    let checked_qty = counts
        .checked_qty
        .checked_add(quantity)
        .ok_or(AppError::InventoryExceeded)?;
    if checked_qty > counts.inventory_total_qty {
        return Err(AppError::InventoryExceeded);
    }
    Ok(InventoryCounts {
        checked_qty,
        ..counts
    })
}

/// Counts after taking back `quantity` copies. Returning more than is checked
/// out is rejected rather than clamped.
pub fn plan_return(counts: InventoryCounts, quantity: i32) -> Result<InventoryCounts, AppError> {
    if counts.checked_qty < quantity {
        return Err(AppError::NothingToReturn);
    }
    Ok(InventoryCounts {
        checked_qty: counts.checked_qty - quantity,
        ..counts
    })
}

fn require_positive(quantity: i32) -> Result<(), AppError> {
    if quantity < 1 {
        return Err(AppError::invalid_field("quantity", "The quantity must be at least 1."));
    }
    Ok(())
}

async fn lock(conn: &mut PgConnection, book_id: Uuid) -> Result<InventoryCounts, AppError> {
    db::books::lock_counts(&mut *conn, book_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
}

pub async fn checkout(
    conn: &mut PgConnection,
    book_id: Uuid,
    quantity: i32,
) -> Result<InventoryCounts, AppError> {
    require_positive(quantity)?;
    let current = lock(conn, book_id).await?;
    let next = plan_checkout(current, quantity).inspect_err(|_| {
        tracing::info!(
            %book_id,
            checked_qty = current.checked_qty,
            inventory_total_qty = current.inventory_total_qty,
            available = current.available(),
            "Checkout rejected, inventory exhausted"
        );
    })?;
    Ok(db::books::set_checked_qty(&mut *conn, book_id, next.checked_qty).await?)
}

pub async fn checkin(
    conn: &mut PgConnection,
    book_id: Uuid,
    quantity: i32,
) -> Result<InventoryCounts, AppError> {
    require_positive(quantity)?;
    let current = lock(conn, book_id).await?;
    let next = plan_return(current, quantity).inspect_err(|_| {
        tracing::warn!(
            %book_id,
            checked_qty = current.checked_qty,
            "Return rejected, no copies checked out"
        );
    })?;
    Ok(db::books::set_checked_qty(&mut *conn, book_id, next.checked_qty).await?)
}
