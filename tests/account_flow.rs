use axum_storefront_api::{
    config::AuthConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::auth::{ForgotPasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest},
    error::AppError,
    gateway::PaymentGateway,
    middleware::auth::AuthUser,
    routes::params::Pagination,
    security::token,
    services::account_service,
    state::AppState,
};
use sea_orm::{ConnectionTrait, Statement};

// Registration, login, answer-gated reset, and profile update against a real
// database. Skips when no DATABASE_URL is configured.
#[tokio::test]
async fn register_login_reset_and_profile_flow() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let registered = account_service::register(
        &state.pool,
        register_request("a@b.com", "pw123456"),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(registered.email, "a@b.com");

    // The digest never appears in the serialized record.
    let body = serde_json::to_value(&registered)?;
    assert!(body.get("password_hash").is_none());
    assert!(body.get("answer_hash").is_none());

    // Second registration with the same email is rejected and the first
    // record is untouched.
    let err = account_service::register(
        &state.pool,
        register_request("a@b.com", "otherpassword"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Duplicate(_)));

    let err = account_service::login(
        &state.pool,
        &state.auth,
        LoginRequest {
            email: "a@b.com".into(),
            password: "wrong".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated(_)));

    let login = account_service::login(
        &state.pool,
        &state.auth,
        LoginRequest {
            email: "a@b.com".into(),
            password: "pw123456".into(),
        },
    )
    .await?
    .data
    .unwrap();

    let jwt = login.token.trim_start_matches("Bearer ").to_string();
    let claims = token::verify(&jwt, &state.auth.jwt_secret)?;
    assert_eq!(claims.sub, registered.id.to_string());
    assert_eq!(claims.role, "user");

    // Unknown email is NotFound, distinct from a bad password.
    let err = account_service::login(
        &state.pool,
        &state.auth,
        LoginRequest {
            email: "nobody@b.com".into(),
            password: "pw123456".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    // Answer-gated reset, then login with the new password.
    let err = account_service::forgot_password(
        &state.pool,
        ForgotPasswordRequest {
            email: "a@b.com".into(),
            answer: "wrong answer".into(),
            new_password: "newpassword".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    account_service::forgot_password(
        &state.pool,
        ForgotPasswordRequest {
            email: "a@b.com".into(),
            answer: "I love ecomm".into(),
            new_password: "newpassword".into(),
        },
    )
    .await?;

    account_service::login(
        &state.pool,
        &state.auth,
        LoginRequest {
            email: "a@b.com".into(),
            password: "newpassword".into(),
        },
    )
    .await?;

    // Partial profile update keeps absent fields.
    let caller = AuthUser {
        user_id: registered.id,
        role: "user".into(),
    };
    let err = account_service::update_profile(
        &state.pool,
        &caller,
        UpdateProfileRequest {
            password: Some("short".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let updated = account_service::update_profile(
        &state.pool,
        &caller,
        UpdateProfileRequest {
            phone: Some("0987654321".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(updated.phone, "0987654321");
    assert_eq!(updated.name, "ecommlover");
    assert_eq!(updated.address, "ecomm street");

    // Listing accounts is admin-only.
    let err = account_service::list_users(
        &state.pool,
        &caller,
        Pagination {
            page: None,
            per_page: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    Ok(())
}

fn register_request(email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        name: "ecommlover".into(),
        email: email.into(),
        password: password.into(),
        phone: "1234567890".into(),
        address: "ecomm street".into(),
        answer: "I love ecomm".into(),
    }
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, products, categories, audit_logs, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState {
        pool,
        orm,
        gateway: PaymentGateway::sandbox(),
        auth: AuthConfig {
            jwt_secret: "test-secret".into(),
            token_ttl_hours: 1,
        },
    })
}
