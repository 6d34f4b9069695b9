use axum::Json;
use serde::Serialize;

/// Success envelope shared by every API handler: `{success, message, results}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<T>,
}

pub type ApiResponse<T> = Json<Envelope<T>>;

pub fn ok<T: Serialize>(results: T, message: impl Into<String>) -> ApiResponse<T> {
    Json(Envelope {
        success: true,
        message: message.into(),
        results: Some(results),
    })
}

pub fn message(message: impl Into<String>) -> ApiResponse<()> {
    Json(Envelope {
        success: true,
        message: message.into(),
        results: None,
    })
}
