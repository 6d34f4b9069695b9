use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::tokens;
use crate::db;
use crate::error::AppError;
use crate::models::{PersonalAccessToken, User};
use crate::state::SharedState;

/// The identity a protected handler runs as. Resolved from the bearer
/// credential on every request; nothing is kept between requests.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: PersonalAccessToken,
}

impl AuthUser {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn require_ability(&self, ability: &str) -> Result<(), AppError> {
        if self.token.can(ability) {
            Ok(())
        } else {
            Err(AppError::Unauthorized(format!(
                "Token is missing the '{ability}' ability."
            )))
        }
    }
}

/// The raw credential from `Authorization: Bearer ...`, if any.
pub fn bearer_credential(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

/// Resolve a presented credential to an authenticated user and record the use.
pub async fn authenticate(
    pool: &PgPool,
    credential: &str,
    now: DateTime<Utc>,
) -> Result<AuthUser, AppError> {
    let token = tokens::resolve(pool, credential)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid token.".to_string()))?;

    if token.is_expired_at(now) {
        return Err(AppError::Unauthorized("Token expired.".to_string()));
    }

    let user = db::users::find_by_id(pool, token.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found.".to_string()))?;

    tokens::touch(pool, token.id).await?;

    Ok(AuthUser { user, token })
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let credential = bearer_credential(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Unauthenticated.".to_string()))?;

        let auth = authenticate(&state.pool, &credential, Utc::now()).await;
        if let Err(AppError::Unauthorized(reason)) = &auth {
            tracing::debug!(%reason, "Rejected bearer credential");
        }
        auth
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_credential_reads_authorization_header() {
        let mut headers = HeaderMap::new();
        assert!(bearer_credential(&headers).is_none());

        headers.insert(
            "authorization",
            HeaderValue::from_static("Bearer 0190f8a4-8b53-7d3c-9a40-1c2b3d4e5f60|s3cret"),
        );
        assert_eq!(
            bearer_credential(&headers).as_deref(),
            Some("0190f8a4-8b53-7d3c-9a40-1c2b3d4e5f60|s3cret")
        );
    }

    #[test]
    fn non_bearer_schemes_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(bearer_credential(&headers).is_none());
    }
}
