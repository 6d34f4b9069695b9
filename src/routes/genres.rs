use axum::extract::State;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::error::AppError;
use crate::models::Genre;
use crate::response::{self, ApiResponse};
use crate::state::SharedState;

pub async fn list(
    _auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<ApiResponse<Vec<Genre>>, AppError> {
    let genres = db::genres::list(&state.pool).await?;
    Ok(response::ok(genres, "Genres"))
}
