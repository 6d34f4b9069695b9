use axum::extract::State;
use axum::http::HeaderMap;
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::checkouts;
use crate::db;
use crate::db::books::BookInput;
use crate::error::AppError;
use crate::extract::{AppJson, AppPath};
use crate::models::{BookWithGenre, CheckoutRecord};
use crate::reports::{self, Delivery};
use crate::response::{self, ApiResponse};
use crate::state::{AppState, SharedState};
use crate::upload;
use crate::validation::{parse_date, FieldErrors};

#[derive(Deserialize)]
pub struct BookRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub genre_id: Option<Uuid>,
    pub inventory_total_qty: Option<i32>,
}

#[derive(Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub due_date: String,
}

#[derive(Serialize)]
pub struct BookView {
    #[serde(flatten)]
    pub book: BookWithGenre,
    pub cover_url: Option<String>,
    pub available_qty: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkouts: Option<Vec<CheckoutRecord>>,
}

#[derive(Serialize)]
pub struct BookResult {
    pub book: BookView,
}

#[derive(Serialize)]
pub struct CheckoutResult {
    pub book: BookView,
    pub checkout: CheckoutRecord,
}

#[derive(Serialize)]
pub struct ReportResult {
    pub as_of: chrono::NaiveDate,
    pub overdue_count: usize,
    pub sent: bool,
}

impl BookRequest {
    fn validate(&self) -> Result<BookInput<'_>, AppError> {
        let mut errors = FieldErrors::new();
        errors.require("name", &self.name);
        errors.require("description", &self.description);
        match self.inventory_total_qty {
            None => errors.add("inventory_total_qty", "The inventory total qty field is required."),
            Some(qty) if qty < 1 => {
                errors.add("inventory_total_qty", "The inventory total qty field must be at least 1.")
            }
            Some(_) => {}
        }
        errors.into_result()?;

        Ok(BookInput {
            name: self.name.trim(),
            description: self.description.trim(),
            genre_id: self.genre_id,
            inventory_total_qty: self.inventory_total_qty.unwrap_or_default(),
        })
    }
}

fn map_write_error(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
            AppError::invalid_field("genre_id", "The selected genre id is invalid.")
        }
        sqlx::Error::Database(ref db_err) if db_err.is_check_violation() => {
            AppError::Conflict("Book inventory changed, please retry".to_string())
        }
        sqlx::Error::RowNotFound => AppError::NotFound("Book not found".to_string()),
        _ => AppError::Database(e),
    }
}

async fn view(state: &AppState, book: BookWithGenre, checkouts: Option<Vec<CheckoutRecord>>) -> BookView {
    let cover_url = match &book.book.cover {
        Some(path) => state.storage.url_for(path, None).await,
        None => None,
    };
    let available_qty = book.book.inventory_total_qty - book.book.checked_qty;
    BookView {
        book,
        cover_url,
        available_qty,
        checkouts,
    }
}

/// Fresh copy of a book with its open checkouts.
async fn load_view(state: &AppState, id: Uuid) -> Result<BookView, AppError> {
    let book = db::books::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;
    let open = db::checkouts::open_for_book(&state.pool, id).await?;
    Ok(view(state, book, Some(open)).await)
}

pub async fn index(
    _auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<ApiResponse<Vec<BookView>>, AppError> {
    let books = db::books::list(&state.pool).await?;
    let mut views = Vec::with_capacity(books.len());
    for book in books {
        views.push(view(&state, book, None).await);
    }
    Ok(response::ok(views, "Books"))
}

pub async fn show(
    _auth: AuthUser,
    State(state): State<SharedState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<ApiResponse<BookResult>, AppError> {
    let book = load_view(&state, id).await?;
    Ok(response::ok(BookResult { book }, "Book"))
}

pub async fn history(
    _auth: AuthUser,
    State(state): State<SharedState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<ApiResponse<Vec<CheckoutRecord>>, AppError> {
    db::books::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;
    let records = db::checkouts::history_for_book(&state.pool, id).await?;
    Ok(response::ok(records, "Checkout history"))
}

pub async fn store(
    auth: AuthUser,
    State(state): State<SharedState>,
    AppJson(req): AppJson<BookRequest>,
) -> Result<ApiResponse<BookResult>, AppError> {
    auth.require_ability("books:write")?;
    let input = req.validate()?;

    let book = db::books::create(&state.pool, &input)
        .await
        .map_err(map_write_error)?;

    tracing::info!(book_id = %book.id, user_id = %auth.user_id(), "Book created");

    let book = load_view(&state, book.id).await?;
    Ok(response::ok(BookResult { book }, "Book successfully created!"))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<BookRequest>,
) -> Result<ApiResponse<BookResult>, AppError> {
    auth.require_ability("books:write")?;
    let input = req.validate()?;

    let mut tx = state.pool.begin().await?;

    let counts = db::books::lock_counts(&mut *tx, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

    if input.inventory_total_qty < counts.checked_qty {
        return Err(AppError::invalid_field(
            "inventory_total_qty",
            format!(
                "The inventory total qty field must be greater than or equal to {} (copies checked out).",
                counts.checked_qty
            ),
        ));
    }

    db::books::update(&mut *tx, id, &input)
        .await
        .map_err(map_write_error)?;

    tx.commit().await?;

    tracing::info!(book_id = %id, user_id = %auth.user_id(), "Book updated");

    let book = load_view(&state, id).await?;
    Ok(response::ok(BookResult { book }, "Book successfully updated!"))
}

pub async fn destroy(
    auth: AuthUser,
    State(state): State<SharedState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    auth.require_ability("books:write")?;

    let book = db::books::delete(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

    if let Some(cover) = book.cover.as_deref() {
        if let Err(e) = state.storage.delete(cover).await {
            tracing::warn!(book_id = %id, "Failed to delete cover {cover}: {e}");
        }
    }

    tracing::info!(book_id = %id, user_id = %auth.user_id(), "Book deleted");

    Ok(response::ok(json!({ "book": { "id": id } }), "Book Deleted"))
}

pub async fn checkout(
    auth: AuthUser,
    State(state): State<SharedState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<CheckoutRequest>,
) -> Result<ApiResponse<CheckoutResult>, AppError> {
    let due_date = parse_date(&req.due_date).ok_or_else(|| {
        AppError::invalid_field("due_date", "The due date field must match the format Y-m-d.")
    })?;
    let today = Utc::now().date_naive();

    let outcome = checkouts::checkout_book(&state.pool, auth.user_id(), id, due_date, today).await?;

    let book = load_view(&state, id).await?;
    Ok(response::ok(
        CheckoutResult {
            book,
            checkout: outcome.record,
        },
        "Book Checkedout",
    ))
}

pub async fn return_book(
    auth: AuthUser,
    State(state): State<SharedState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<ApiResponse<CheckoutResult>, AppError> {
    let today = Utc::now().date_naive();

    let outcome = checkouts::return_book(&state.pool, auth.user_id(), id, today).await?;

    let book = load_view(&state, id).await?;
    Ok(response::ok(
        CheckoutResult {
            book,
            checkout: outcome.record,
        },
        "Book Returned",
    ))
}

pub async fn update_book_picture(
    auth: AuthUser,
    State(state): State<SharedState>,
    AppPath(id): AppPath<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse<BookResult>, AppError> {
    auth.require_ability("books:write")?;

    let existing = db::books::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

    let image = upload::read_image(&headers, body, "file").await?;
    let path = format!("images/{}_book_cover.{}", Uuid::now_v7(), image.extension);

    let path = state
        .storage
        .put(&path, image.bytes)
        .await
        .map_err(|e| AppError::Dependency(format!("Book cover upload failed: {e}")))?;

    db::books::set_cover(&state.pool, id, Some(&path))
        .await
        .map_err(map_write_error)?;

    if let Some(old) = existing.book.cover.as_deref() {
        if let Err(e) = state.storage.delete(old).await {
            tracing::warn!(book_id = %id, "Failed to delete previous cover {old}: {e}");
        }
    }

    let book = load_view(&state, id).await?;
    Ok(response::ok(BookResult { book }, "Book picture successfully updated!"))
}

/// Mail the overdue list to the caller.
pub async fn send_book_report(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<ApiResponse<ReportResult>, AppError> {
    let today = Utc::now().date_naive();

    tracing::info!(user_id = %auth.user_id(), "Sending book report");

    let outcome =
        reports::send_overdue_report(&state.pool, state.notifier.as_ref(), &auth.user.email, today)
            .await?;

    let sent = match outcome.delivery {
        Delivery::Sent => true,
        Delivery::NothingOverdue => false,
        Delivery::Failed(reason) => {
            return Err(AppError::Dependency(format!(
                "Failed to send book report ({} overdue): {reason}",
                outcome.overdue.len()
            )));
        }
    };

    Ok(response::ok(
        ReportResult {
            as_of: outcome.as_of,
            overdue_count: outcome.overdue.len(),
            sent,
        },
        "Book Report Sent!",
    ))
}
