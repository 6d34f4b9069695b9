use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const PURPOSE: &str = "verify_email";

/// Claims of a signed email-verification link.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifyEmailClaims {
    pub sub: Uuid,
    pub email: String,
    pub purpose: String,
    pub exp: i64,
}

impl VerifyEmailClaims {
    pub fn new(user_id: Uuid, email: &str) -> Self {
        Self {
            sub: user_id,
            email: email.to_string(),
            purpose: PURPOSE.to_string(),
            exp: (Utc::now() + Duration::hours(24)).timestamp(),
        }
    }
}

pub fn encode_token(claims: &VerifyEmailClaims, secret: &str) -> Result<String, String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| format!("Verification token encode failed: {e}"))
}

pub fn decode_token(token: &str, secret: &str) -> Result<VerifyEmailClaims, String> {
    let claims = decode::<VerifyEmailClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Verification token decode failed: {e}"))?;

    if claims.purpose != PURPOSE {
        return Err("Token was not issued for email verification".to_string());
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-signing-secret-long-enough-0001";

    #[test]
    fn issued_link_decodes_with_same_secret() {
        let id = Uuid::now_v7();
        let token = encode_token(&VerifyEmailClaims::new(id, "reader@example.com"), SECRET).unwrap();
        let claims = decode_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "reader@example.com");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = encode_token(&VerifyEmailClaims::new(Uuid::now_v7(), "a@b.co"), SECRET).unwrap();
        assert!(decode_token(&token, "another-secret-that-is-also-long-000").is_err());
    }

    #[test]
    fn expired_link_is_rejected() {
        let mut claims = VerifyEmailClaims::new(Uuid::now_v7(), "a@b.co");
        claims.exp = (Utc::now() - Duration::hours(2)).timestamp();
        let token = encode_token(&claims, SECRET).unwrap();
        assert!(decode_token(&token, SECRET).is_err());
    }

    #[test]
    fn other_purposes_are_rejected() {
        let mut claims = VerifyEmailClaims::new(Uuid::now_v7(), "a@b.co");
        claims.purpose = "password_reset".to_string();
        let token = encode_token(&claims, SECRET).unwrap();
        assert!(decode_token(&token, SECRET).is_err());
    }
}
