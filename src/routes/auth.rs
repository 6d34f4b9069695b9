use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Redirect;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::extractor::bearer_credential;
use crate::auth::{password, tokens, verification};
use crate::db;
use crate::email::Notification;
use crate::error::AppError;
use crate::extract::{AppJson, AppQuery};
use crate::response::{self, ApiResponse};
use crate::state::SharedState;
use crate::validation::{is_email, FieldErrors};

const TOKEN_NAME: &str = "api";

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub c_password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize)]
pub struct PasswordResetQuery {
    pub token: Option<String>,
    pub set_password: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyEmailQuery {
    pub token: Option<String>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub token: String,
    pub name: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub name: String,
    pub avatar: Option<String>,
}

fn all_abilities() -> Vec<String> {
    vec!["*".to_string()]
}

fn token_expiry(state: &SharedState) -> Option<chrono::DateTime<Utc>> {
    state.config.token_ttl.map(|ttl| Utc::now() + ttl)
}

fn generate_reset_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

pub async fn register(
    State(state): State<SharedState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<ApiResponse<RegisterResponse>, AppError> {
    let mut errors = FieldErrors::new();
    errors.require("name", &req.name);
    if !is_email(&req.email) {
        errors.add("email", "The email field must be a valid email address.");
    }
    if req.password.len() < password::MIN_LENGTH {
        errors.add("password", "The password field must be at least 8 characters.");
    }
    if req.c_password != req.password {
        errors.add("c_password", "The c password field must match password.");
    }
    errors.into_result()?;

    let pw_hash = password::hash(&req.password).map_err(AppError::Internal)?;

    let mut tx = state.pool.begin().await?;

    let user = db::users::create(&mut *tx, req.name.trim(), &req.email, &pw_hash)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::invalid_field("email", "The email has already been taken.")
            }
            _ => AppError::Database(e),
        })?;

    let issued = tokens::issue(
        &mut *tx,
        user.id,
        TOKEN_NAME,
        &all_abilities(),
        token_expiry(&state),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok(response::ok(
        RegisterResponse {
            token: issued.plaintext,
            name: user.name,
        },
        "User register successfully.",
    ))
}

pub async fn login(
    State(state): State<SharedState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, AppError> {
    if let Err(retry_after) = state.login_limiter.check(&req.email) {
        return Err(AppError::RateLimited(format!(
            "Too many login attempts. Please try again in {retry_after} seconds."
        )));
    }

    let Some(user) = db::users::find_by_email(&state.pool, &req.email).await? else {
        password::verify_dummy(&req.password);
        state.login_limiter.record_failure(&req.email);
        return Err(AppError::Unauthorized("Unauthorised.".to_string()));
    };

    let valid = password::verify(&req.password, &user.password_hash).map_err(AppError::Internal)?;
    if !valid {
        state.login_limiter.record_failure(&req.email);
        return Err(AppError::Unauthorized("Unauthorised.".to_string()));
    }
    state.login_limiter.reset(&req.email);

    // One live session per user: earlier tokens die with this login.
    let mut tx = state.pool.begin().await?;
    let revoked = tokens::revoke_all(&mut *tx, user.id).await?;
    let issued = tokens::issue(
        &mut *tx,
        user.id,
        TOKEN_NAME,
        &all_abilities(),
        token_expiry(&state),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(user_id = %user.id, revoked, "User logged in");

    let avatar = match &user.avatar {
        Some(path) => state.storage.url_for(path, None).await,
        None => None,
    };

    Ok(response::ok(
        LoginResponse {
            token: issued.plaintext,
            name: user.name,
            avatar,
        },
        "User login successfully.",
    ))
}

/// Revokes the presented token if it resolves. Always succeeds.
pub async fn logout(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<ApiResponse<()>, AppError> {
    if let Some(credential) = bearer_credential(&headers) {
        if let Some(token) = tokens::resolve(&state.pool, &credential).await? {
            tokens::revoke(&state.pool, token.id).await?;
            tracing::info!(user_id = %token.user_id, token_id = %token.id, "User logged out");
        }
    }

    Ok(response::message("User logout successfully. Token cleared."))
}

pub async fn forgot_password(
    State(state): State<SharedState>,
    AppJson(req): AppJson<ForgotPasswordRequest>,
) -> Result<ApiResponse<()>, AppError> {
    // Same answer whether or not the address is registered
    let reply = response::message("Check your email for password reset email.");

    if !is_email(&req.email) {
        return Ok(reply);
    }

    let Some(user) = db::users::find_by_email(&state.pool, &req.email).await? else {
        return Ok(reply);
    };

    let token = generate_reset_token();
    db::password_reset_tokens::create(
        &state.pool,
        user.id,
        &tokens::hash_secret(&token),
        Utc::now() + Duration::hours(1),
    )
    .await?;

    let reset_url = format!("{}/api/password_reset?token={token}", state.config.base_url);
    if let Err(e) = state
        .notifier
        .send(&[user.email.clone()], &Notification::PasswordReset { reset_url })
        .await
    {
        tracing::error!(user_id = %user.id, "Failed to send password reset email: {e}");
    }

    Ok(reply)
}

/// Completes a reset. With `set_password` the new password is applied
/// directly; without it a temporary password is generated and mailed.
pub async fn password_reset(
    State(state): State<SharedState>,
    AppQuery(query): AppQuery<PasswordResetQuery>,
) -> Result<ApiResponse<()>, AppError> {
    let token = query
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::invalid_field("token", "The token field is required."))?;

    let chosen = query.set_password.filter(|p| !p.is_empty());
    if let Some(ref p) = chosen {
        if p.len() < password::MIN_LENGTH {
            return Err(AppError::invalid_field(
                "set_password",
                "The set password field must be at least 8 characters.",
            ));
        }
    }
    let new_password = chosen.clone().unwrap_or_else(password::generate_temporary);
    let pw_hash = password::hash(&new_password).map_err(AppError::Internal)?;
    let token_hash = tokens::hash_secret(&token);

    // The temporary password goes out before any row is locked. A failed
    // delivery leaves the token unused and the old password in place.
    if chosen.is_none() {
        let pending = db::password_reset_tokens::find_valid_by_hash(&state.pool, &token_hash)
            .await?
            .ok_or_else(|| AppError::validation("Token Expired or Incorrect."))?;
        let user = db::users::find_by_id(&state.pool, pending.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        state
            .notifier
            .send(
                &[user.email],
                &Notification::TemporaryPassword {
                    password: new_password,
                },
            )
            .await
            .map_err(|e| AppError::Dependency(format!("Failed to send temporary password: {e}")))?;
    }

    let mut tx = state.pool.begin().await?;

    let reset = db::password_reset_tokens::consume_valid_by_hash(&mut *tx, &token_hash)
        .await?
        .ok_or_else(|| AppError::validation("Token Expired or Incorrect."))?;

    db::users::update_password(&mut *tx, reset.user_id, &pw_hash).await?;
    tokens::revoke_all(&mut *tx, reset.user_id).await?;

    tx.commit().await?;

    tracing::info!(user_id = %reset.user_id, "Password reset");

    if chosen.is_some() {
        Ok(response::message("Password Reset Successfully!"))
    } else {
        Ok(response::message(
            "Password Reset Complete! Email Sent with a Temp New Password!",
        ))
    }
}

pub async fn verify_email(
    State(state): State<SharedState>,
    AppQuery(query): AppQuery<VerifyEmailQuery>,
) -> Result<Redirect, AppError> {
    let token = query
        .token
        .ok_or_else(|| AppError::invalid_field("token", "The token field is required."))?;

    let claims = verification::decode_token(&token, &state.config.signing_secret).map_err(|e| {
        tracing::debug!("Rejected verification link: {e}");
        AppError::validation("Email Expired or Incorrect.")
    })?;

    db::users::mark_email_verified(&state.pool, claims.sub, &claims.email)
        .await?
        .ok_or_else(|| AppError::validation("Email Expired or Incorrect."))?;

    tracing::info!(user_id = %claims.sub, "Email verified");

    Ok(Redirect::to(&format!("{}/home", state.config.frontend_url)))
}
