use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub cover: Option<String>,
    pub genre_id: Option<Uuid>,
    pub checked_qty: i32,
    pub inventory_total_qty: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The ledger columns of a book row, as read under lock or returned after a
/// mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct InventoryCounts {
    pub book_id: Uuid,
    pub checked_qty: i32,
    pub inventory_total_qty: i32,
}

impl InventoryCounts {
    pub fn available(&self) -> i32 {
        self.inventory_total_qty - self.checked_qty
    }
}

/// A book row joined with its genre name.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct BookWithGenre {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub book: Book,
    pub genre_name: Option<String>,
}
