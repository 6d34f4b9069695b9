use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

#[derive(Debug)]
pub enum AppError {
    /// Bad input shape or constraint; the optional value carries per-field details.
    Validation(String, Option<Value>),
    Unauthorized(String),
    NotFound(String),
    InventoryExceeded,
    NothingToReturn,
    NoActiveCheckout,
    Conflict(String),
    RateLimited(String),
    /// Storage or notifier failure.
    Dependency(String),
    Internal(String),
    Database(sqlx::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into(), None)
    }

    pub fn invalid_field(field: &str, msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        AppError::Validation(
            "Validation Error.".to_string(),
            Some(json!({ field: [msg] })),
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(..) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) | AppError::NoActiveCheckout => StatusCode::NOT_FOUND,
            AppError::InventoryExceeded | AppError::NothingToReturn => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Dependency(_) | AppError::Internal(_) | AppError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Validation(msg, _) => write!(f, "Validation Error: {msg}"),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            AppError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            AppError::InventoryExceeded => write!(f, "Checked out books can not exceed inventory"),
            AppError::NothingToReturn => write!(f, "No checked out copies to return"),
            AppError::NoActiveCheckout => write!(f, "No active checkout found for this book"),
            AppError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            AppError::RateLimited(msg) => write!(f, "Rate Limited: {msg}"),
            AppError::Dependency(msg) => write!(f, "Dependency Error: {msg}"),
            AppError::Internal(msg) => write!(f, "Internal Error: {msg}"),
            AppError::Database(err) => write!(f, "Database Error: {err}"),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, data) = match self {
            AppError::Validation(msg, details) => (msg, details),
            AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::RateLimited(msg) => (msg, None),
            e @ (AppError::InventoryExceeded
            | AppError::NothingToReturn
            | AppError::NoActiveCheckout) => (e.to_string(), None),
            AppError::Dependency(msg) => {
                tracing::error!("Dependency error: {msg}");
                ("Service temporarily unavailable".to_string(), None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                ("Internal server error".to_string(), None)
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {err}");
                ("Internal server error".to_string(), None)
            }
        };

        let mut body = json!({ "success": false, "message": message });
        if let Some(data) = data {
            body["data"] = data;
        }
        (status, axum::Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}
