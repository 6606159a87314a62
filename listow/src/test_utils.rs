//! Fixtures shared by the handler and repository tests.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    config::{Config, EmailTransportConfig, NotificationsConfig, PasswordConfig},
    db::{
        handlers::{Lists, Repository, Users},
        models::{
            lists::{ListCreateDBRequest, ShoppingList},
            users::{User, UserCreateDBRequest},
        },
    },
    types::UserId,
};

pub fn create_test_config() -> Config {
    // Use temp directory for test emails
    let temp_dir = std::env::temp_dir().join(format!("listow-test-emails-{}", std::process::id()));

    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        notifications: NotificationsConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };

    // Cheap hashing keeps the auth tests fast
    config.auth.native.password = PasswordConfig {
        argon2_memory_kib: 1024,
        argon2_iterations: 1,
        argon2_parallelism: 1,
        ..Default::default()
    };
    config.email.transport = EmailTransportConfig::File {
        path: temp_dir.to_string_lossy().to_string(),
    };
    config.uploads.dir = std::env::temp_dir().join(format!("listow-test-uploads-{}", Uuid::new_v4().simple()));

    config
}

pub fn create_test_state(pool: PgPool, config: Config) -> AppState {
    AppState::new(pool, config)
}

/// Insert a passwordless user named after the email's local part.
pub async fn create_test_user(pool: &PgPool, email: &str) -> User {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let name = email.split('@').next().unwrap_or("Test User").to_string();

    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            name,
            email: email.to_string(),
            password_hash: None,
            google_id: None,
            photo_url: None,
        })
        .await
        .expect("Failed to create test user")
}

/// Like [`create_test_user`], with a hashed password so the user can log in.
pub async fn create_test_user_with_password(pool: &PgPool, email: &str, password: &str, config: &Config) -> User {
    let hash = crate::auth::password::hash_string_with_params(password, Some(config.auth.native.password.argon2_params()))
        .expect("Failed to hash password");
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");

    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            name: "Test User".to_string(),
            email: email.to_string(),
            password_hash: Some(hash),
            google_id: None,
            photo_url: None,
        })
        .await
        .expect("Failed to create test user")
}

pub async fn create_test_list(pool: &PgPool, owner_id: UserId, name: &str) -> ShoppingList {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Lists::new(&mut conn)
        .create(&ListCreateDBRequest {
            name: name.to_string(),
            description: None,
            owner_id,
        })
        .await
        .expect("Failed to create test list")
}

pub fn add_auth_headers(user: &User, config: &Config) -> Vec<(String, String)> {
    let current_user = CurrentUser {
        id: user.id,
        email: user.email.clone(),
    };
    let token = session::create_session_token(&current_user, config).expect("Failed to create session token");

    vec![("authorization".to_string(), format!("Bearer {token}"))]
}

/// A test server over the full router, with every route under `/api`.
pub fn create_test_server(pool: PgPool, config: Config) -> axum_test::TestServer {
    let router = crate::build_router(create_test_state(pool, config)).expect("Failed to build router");
    axum_test::TestServer::new(router).expect("Failed to create test server")
}
