//! Opaque bearer tokens of the form `<id>|<secret>`.
//!
//! Only the SHA-256 of the secret is stored, so a token can be shown exactly
//! once at issue time. Resolution looks the row up by id and compares hashes
//! in constant time.

use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::db;
use crate::models::PersonalAccessToken;

const SECRET_LENGTH: usize = 40;

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: PersonalAccessToken,
    /// `<id>|<secret>`; never stored and never retrievable again.
    pub plaintext: String,
}

pub fn generate_secret() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LENGTH)
        .map(char::from)
        .collect()
}

pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Split a presented credential into its id and secret halves.
pub fn parse_credential(presented: &str) -> Option<(Uuid, &str)> {
    let (id, secret) = presented.split_once('|')?;
    if secret.is_empty() {
        return None;
    }
    let id = Uuid::parse_str(id).ok()?;
    Some((id, secret))
}

fn secret_matches(stored_hash: &str, secret: &str) -> bool {
    let presented = hash_secret(secret);
    stored_hash.as_bytes().ct_eq(presented.as_bytes()).into()
}

/// Store a new token for `user_id`. Does not touch the user's other tokens;
/// callers wanting a single live session revoke them first.
pub async fn issue<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
    name: &str,
    abilities: &[String],
    expires_at: Option<DateTime<Utc>>,
) -> Result<IssuedToken, sqlx::Error> {
    let secret = generate_secret();
    let token = db::tokens::create(
        executor,
        user_id,
        name,
        &hash_secret(&secret),
        abilities,
        expires_at,
    )
    .await?;

    let plaintext = format!("{}|{}", token.id, secret);
    Ok(IssuedToken { token, plaintext })
}

/// Look up the token a credential refers to. Any malformed credential, unknown
/// id or hash mismatch yields `None`. Expiry is not checked here.
pub async fn resolve<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    presented: &str,
) -> Result<Option<PersonalAccessToken>, sqlx::Error> {
    let Some((id, secret)) = parse_credential(presented) else {
        return Ok(None);
    };

    let token = db::tokens::find_by_id(executor, id).await?;
    Ok(token.filter(|t| secret_matches(&t.token_hash, secret)))
}

/// Idempotent: revoking an already-deleted token is not an error.
pub async fn revoke<'e, E: sqlx::PgExecutor<'e>>(executor: E, id: Uuid) -> Result<(), sqlx::Error> {
    if !db::tokens::delete(executor, id).await? {
        tracing::debug!(token_id = %id, "Token already revoked");
    }
    Ok(())
}

pub async fn revoke_all<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
) -> Result<u64, sqlx::Error> {
    db::tokens::delete_all_for_user(executor, user_id).await
}

pub async fn touch<'e, E: sqlx::PgExecutor<'e>>(executor: E, id: Uuid) -> Result<(), sqlx::Error> {
    db::tokens::touch(executor, id).await
}
