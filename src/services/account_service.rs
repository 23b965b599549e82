use uuid::Uuid;

use crate::{
    audit::{AuditAction, log_audit},
    config::AuthConfig,
    db::DbPool,
    dto::auth::{
        ForgotPasswordRequest, LoginRequest, LoginResponse, RegisterRequest, UpdateProfileRequest,
        UserList,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::User,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    security::{password, token},
};

const MIN_PASSWORD_LEN: usize = 6;

pub async fn register(pool: &DbPool, payload: RegisterRequest) -> AppResult<ApiResponse<User>> {
    let RegisterRequest {
        name,
        email,
        password: plaintext,
        phone,
        address,
        answer,
    } = payload;

    for (field, value) in [
        ("name", &name),
        ("email", &email),
        ("phone", &phone),
        ("address", &address),
        ("answer", &answer),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{field} is required")));
        }
    }
    validate_password(&plaintext)?;

    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(pool)
        .await?;

    if exist.is_some() {
        return Err(AppError::Duplicate("Already registered, please login".into()));
    }

    let password_hash = password::hash(&plaintext)?;
    let answer_hash = password::hash(answer.trim())?;
    let id = Uuid::new_v4();

    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, phone, address, answer_hash)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name.trim())
    .bind(email.as_str())
    .bind(password_hash)
    .bind(phone.trim())
    .bind(address.trim())
    .bind(answer_hash)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.id),
        AuditAction::UserRegister,
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("User registered successfully", user, None))
}

pub async fn login(
    pool: &DbPool,
    auth: &AuthConfig,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest {
        email,
        password: plaintext,
    } = payload;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(pool)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    if !password::verify(&plaintext, &user.password_hash) {
        return Err(AppError::Unauthenticated("Invalid email or password".into()));
    }

    let jwt = token::issue(user.id, &user.role, &auth.jwt_secret, auth.token_ttl_hours)?;

    if let Err(err) = log_audit(
        pool,
        Some(user.id),
        AuditAction::UserLogin,
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let resp = LoginResponse {
        token: format!("Bearer {}", jwt),
        user,
    };
    Ok(ApiResponse::success("Logged in", resp, Some(Meta::empty())))
}

/// Answer-gated reset: no session and no old password required. A wrong
/// email/answer pair reads the same as an unknown email.
pub async fn forgot_password(
    pool: &DbPool,
    payload: ForgotPasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let ForgotPasswordRequest {
        email,
        answer,
        new_password,
    } = payload;

    validate_password(&new_password)?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(pool)
        .await?;

    let user = match user {
        Some(u) if password::verify(answer.trim(), &u.answer_hash) => u,
        _ => return Err(AppError::NotFound),
    };

    let password_hash = password::hash(&new_password)?;
    sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(user.id)
        .bind(password_hash)
        .execute(pool)
        .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.id),
        AuditAction::PasswordReset,
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::message_only("Password reset successfully"))
}

/// Partial update; absent fields keep their stored values so a sparse payload
/// never nulls anything out.
pub async fn update_profile(
    pool: &DbPool,
    caller: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(caller.user_id)
        .fetch_optional(pool)
        .await?;
    let existing = match existing {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    let password_hash = match payload.password.as_deref() {
        Some(new_password) => {
            validate_password(new_password)?;
            password::hash(new_password)?
        }
        None => existing.password_hash.clone(),
    };

    let name = payload.name.unwrap_or(existing.name);
    let phone = payload.phone.unwrap_or(existing.phone);
    let address = payload.address.unwrap_or(existing.address);

    let user: User = sqlx::query_as(
        r#"
        UPDATE users
        SET name = $2, password_hash = $3, phone = $4, address = $5
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(caller.user_id)
    .bind(name)
    .bind(password_hash)
    .bind(phone)
    .bind(address)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.id),
        AuditAction::ProfileUpdate,
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Profile updated", user, None))
}

pub async fn list_users(
    pool: &DbPool,
    caller: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(caller)?;
    let (page, limit, offset) = pagination.normalize();

    let items: Vec<User> =
        sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

    let total: (i64,) = sqlx::query_as("SELECT count(*) FROM users")
        .fetch_one(pool)
        .await?;

    let meta = Meta::paged(page, limit, total.0);
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

fn validate_password(plaintext: &str) -> Result<(), AppError> {
    if plaintext.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password is required and must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_passwords_fail_the_policy() {
        assert!(matches!(
            validate_password("pw123"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(validate_password(""), Err(AppError::Validation(_))));
    }

    #[test]
    fn six_characters_is_the_floor() {
        assert!(validate_password("pw1234").is_ok());
        assert!(validate_password("iloveecomm").is_ok());
    }
}
