use axum::extract::State;
use axum::http::HeaderMap;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::auth::verification::{self, VerifyEmailClaims};
use crate::db;
use crate::email::Notification;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::models::{CheckoutRecord, User};
use crate::response::{self, ApiResponse};
use crate::state::{AppState, SharedState};
use crate::upload;
use crate::validation::is_email;

#[derive(Serialize)]
pub struct UserView {
    #[serde(flatten)]
    pub user: User,
    pub avatar_url: Option<String>,
    pub checkouts: Vec<CheckoutRecord>,
}

#[derive(Deserialize)]
pub struct ChangeEmailRequest {
    #[serde(default)]
    pub change_email: String,
}

async fn send_verification(state: &AppState, user: &User) -> Result<(), AppError> {
    let token = verification::encode_token(
        &VerifyEmailClaims::new(user.id, &user.email),
        &state.config.signing_secret,
    )
    .map_err(AppError::Internal)?;
    let verify_url = format!("{}/api/verify_email?token={token}", state.config.base_url);

    state
        .notifier
        .send(&[user.email.clone()], &Notification::VerifyEmail { verify_url })
        .await
        .map_err(|e| AppError::Dependency(format!("Failed to send verification email: {e}")))
}

pub async fn get_user(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<ApiResponse<UserView>, AppError> {
    let avatar_url = match &auth.user.avatar {
        Some(path) => state.storage.url_for(path, None).await,
        None => None,
    };
    let checkouts = db::checkouts::open_for_user(&state.pool, auth.user_id()).await?;

    Ok(response::ok(
        UserView {
            user: auth.user,
            avatar_url,
            checkouts,
        },
        "User",
    ))
}

pub async fn upload_avatar(
    auth: AuthUser,
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let image = upload::read_image(&headers, body, "image").await?;
    let path = format!("images/{}_{}.{}", Uuid::now_v7(), auth.user_id(), image.extension);

    let path = state
        .storage
        .put(&path, image.bytes)
        .await
        .map_err(|e| AppError::Dependency(format!("Avatar upload failed: {e}")))?;

    let user = db::users::set_avatar(&state.pool, auth.user_id(), Some(&path)).await?;

    if let Some(old) = auth.user.avatar.as_deref() {
        if let Err(e) = state.storage.delete(old).await {
            tracing::warn!(user_id = %user.id, "Failed to delete previous avatar {old}: {e}");
        }
    }

    let avatar = state.storage.url_for(&path, None).await;
    Ok(response::ok(
        json!({ "avatar": avatar }),
        "User profile avatar uploaded successfully!",
    ))
}

pub async fn remove_avatar(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    if let Some(path) = auth.user.avatar.as_deref() {
        state
            .storage
            .delete(path)
            .await
            .map_err(|e| AppError::Dependency(format!("Avatar delete failed: {e}")))?;
    }
    db::users::set_avatar(&state.pool, auth.user_id(), None).await?;

    Ok(response::ok(
        json!({ "avatar": null }),
        "User profile avatar removed successfully!",
    ))
}

pub async fn send_verification_email(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    send_verification(&state, &auth.user).await?;
    Ok(response::ok(
        json!({ "status": true }),
        format!("Email sent to {}", auth.user.email),
    ))
}

pub async fn change_email(
    auth: AuthUser,
    State(state): State<SharedState>,
    AppJson(req): AppJson<ChangeEmailRequest>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let email = req.change_email.trim();
    if !is_email(email) {
        return Err(AppError::invalid_field(
            "change_email",
            "The change email field must be a valid email address.",
        ));
    }

    let user = db::users::change_email(&state.pool, auth.user_id(), email)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::invalid_field("change_email", "The change email has already been taken.")
            }
            _ => AppError::Database(e),
        })?;

    tracing::info!(user_id = %user.id, "Email changed");

    send_verification(&state, &user).await?;

    Ok(response::ok(
        json!({ "email": user.email }),
        format!("Email sent to {}", user.email),
    ))
}
