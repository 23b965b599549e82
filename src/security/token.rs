use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Identity payload carried by every bearer token.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

pub fn issue(user_id: Uuid, role: &str, secret: &str, ttl_hours: i64) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: expiration.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    Ok(token)
}

/// Decode and validate a token. Bad signatures and expired tokens both map to
/// `Unauthenticated`; expiry is checked with zero leeway so a ttl of zero
/// fails immediately.
pub fn verify(token: &str, secret: &str) -> AppResult<Claims> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::Unauthenticated("Invalid or expired token".into()))?;

    Ok(decoded.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issue_then_verify_returns_claims() {
        let user_id = Uuid::new_v4();
        let token = issue(user_id, "user", SECRET, 1).unwrap();
        let claims = verify(&token, SECRET).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "user");
    }

    #[test]
    fn zero_ttl_token_is_rejected() {
        let token = issue(Uuid::new_v4(), "user", SECRET, 0).unwrap();
        // exp equals the issue instant; step past it before verifying.
        std::thread::sleep(std::time::Duration::from_secs(1));
        assert!(verify(&token, SECRET).is_err());
    }

    #[test]
    fn past_expiry_token_is_rejected() {
        let token = issue(Uuid::new_v4(), "admin", SECRET, -2).unwrap();
        assert!(verify(&token, SECRET).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue(Uuid::new_v4(), "user", SECRET, 1).unwrap();
        assert!(verify(&token, "another-secret").is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = issue(Uuid::new_v4(), "user", SECRET, 1).unwrap();
        let tampered = format!("{}x", token);
        assert!(verify(&tampered, SECRET).is_err());
    }
}
