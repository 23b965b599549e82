use axum::{
    extract::{FromRef, FromRequestParts},
    http::header,
};
use uuid::Uuid;

use crate::{error::AppError, security::token, state::AppState};

/// The authenticated caller, resolved from the bearer token before any
/// handler runs. Extraction never touches account state.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Admin gate. A caller who got this far is authenticated, so the failure
/// here is Forbidden (403), distinct from the 401 the extractor returns.
pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, "admin")
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthenticated("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthenticated("Invalid Authorization header".into()))?;

        if !auth_str.starts_with("Bearer ") {
            return Err(AppError::Unauthenticated(
                "Invalid Authorization scheme".into(),
            ));
        }
        let token = auth_str.trim_start_matches("Bearer ").trim();

        let app = AppState::from_ref(state);
        let claims = token::verify(token, &app.auth.jwt_secret)?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthenticated("Invalid user id in token".into()))?;

        Ok(AuthUser {
            user_id,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_gate_rejects_ordinary_users_with_forbidden() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            role: "user".into(),
        };
        assert!(matches!(ensure_admin(&user), Err(AppError::Forbidden)));
    }

    #[test]
    fn admin_gate_passes_admins() {
        let admin = AuthUser {
            user_id: Uuid::new_v4(),
            role: "admin".into(),
        };
        assert!(ensure_admin(&admin).is_ok());
    }
}
