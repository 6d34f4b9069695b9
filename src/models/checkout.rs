use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Checkout {
    pub id: Uuid,
    pub checkout_date: NaiveDate,
    pub due_date: NaiveDate,
    pub checkin_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// A checkout joined with the user and book it links.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct CheckoutRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub checkout_date: NaiveDate,
    pub due_date: NaiveDate,
    pub checkin_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct OverdueCheckout {
    pub checkout_id: Uuid,
    pub checkout_date: NaiveDate,
    pub due_date: NaiveDate,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub book_id: Uuid,
    pub book_name: String,
}

impl OverdueCheckout {
    pub fn days_overdue(&self, as_of: NaiveDate) -> i64 {
        (as_of - self.due_date).num_days().max(0)
    }
}
