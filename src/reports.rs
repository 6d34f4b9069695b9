//! Overdue checkout reporting, shared by the on-demand endpoint and the
//! recurring schedule.

use chrono::NaiveDate;
use futures_util::stream::BoxStream;
use futures_util::TryStreamExt;
use sqlx::PgPool;

use crate::db;
use crate::email::{Notification, Notifier};
use crate::models::OverdueCheckout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Nothing was due, so nothing was sent.
    NothingOverdue,
    Sent,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub as_of: NaiveDate,
    pub overdue: Vec<OverdueCheckout>,
    pub delivery: Delivery,
}

/// Lazily stream open checkouts due on or before `as_of`. Each call re-runs
/// the query from the start.
pub fn stream_overdue(
    pool: &PgPool,
    as_of: NaiveDate,
) -> BoxStream<'_, Result<OverdueCheckout, sqlx::Error>> {
    db::checkouts::overdue(pool, as_of)
}

pub async fn find_overdue(pool: &PgPool, as_of: NaiveDate) -> Result<Vec<OverdueCheckout>, sqlx::Error> {
    stream_overdue(pool, as_of).try_collect().await
}

/// Query overdue checkouts and mail the master list to `recipient`. A failed
/// delivery is logged and reported in the outcome; the query result is kept.
pub async fn send_overdue_report(
    pool: &PgPool,
    notifier: &dyn Notifier,
    recipient: &str,
    as_of: NaiveDate,
) -> Result<ReportOutcome, sqlx::Error> {
    let overdue = find_overdue(pool, as_of).await?;

    if overdue.is_empty() {
        tracing::info!(%as_of, "No overdue checkouts, report not sent");
        return Ok(ReportOutcome {
            as_of,
            overdue,
            delivery: Delivery::NothingOverdue,
        });
    }

    let notification = Notification::OverdueReport {
        as_of,
        checkouts: overdue.clone(),
    };

    let delivery = match notifier.send(&[recipient.to_string()], &notification).await {
        Ok(()) => {
            tracing::info!(%as_of, count = overdue.len(), recipient, "Overdue report sent");
            Delivery::Sent
        }
        Err(e) => {
            tracing::error!(%as_of, count = overdue.len(), recipient, "Failed to send overdue report: {e}");
            Delivery::Failed(e.to_string())
        }
    };

    Ok(ReportOutcome {
        as_of,
        overdue,
        delivery,
    })
}
