//! # listow: shared shopping lists
//!
//! `listow` is the HTTP backend for a shopping-list app. Users keep lists of items to buy,
//! share lists with other registered users as readers or writers, and get a push notification
//! on their phone when someone else adds an item to a list they belong to.
//!
//! ## Architecture
//!
//! The service is an [Axum](https://github.com/tokio-rs/axum) application over PostgreSQL.
//! Handlers in [`api::handlers`] validate input, resolve the caller through the
//! [`CurrentUser`](api::models::users::CurrentUser) extractor, check access with
//! [`auth::permissions`] and then run their queries through the repositories in
//! [`db::handlers`]. Every mutation and its audit row share one transaction.
//!
//! Work that talks to other services stays off the request path where it can:
//!
//! - push notifications are delivered by a spawned task through the Expo push API
//!   ([`notifications`]), after the item insert has committed
//! - password reset codes are mailed through [`email`] after the code row has committed
//! - Google ID tokens are checked against Google's tokeninfo endpoint ([`auth::google`])
//!
//! ## Configuration
//!
//! See [`config`] for the YAML file layout and the `LISTOW_` environment overrides.
//!
//! ## Clients
//!
//! The companion `listow-client` crate holds the client-side core: offline action queue,
//! local cache and the list view ordering rules.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
pub mod notifications;
pub mod openapi;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;
pub mod types;

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue},
    routing::{get, patch, post, put},
};
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    api::handlers::{auth as auth_handlers, health, items, lists},
    auth::google::GoogleVerifier,
    config::CorsOrigin,
    notifications::Notifier,
    openapi::ApiDoc,
};

/// Slack on top of the photo size for the other multipart fields.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across all request handlers.
///
/// The pool, the notifier and the Google verifier are all cheap to clone.
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config.clone())
///     .notifier(Notifier::new(config.notifications.clone()))
///     .google(GoogleVerifier::new(config.auth.google.clone()))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub notifier: Notifier,
    pub google: GoogleVerifier,
}

impl AppState {
    /// Build the state with the notifier and verifier the config describes.
    pub fn new(db: PgPool, config: Config) -> Self {
        Self::builder()
            .db(db)
            .notifier(Notifier::new(config.notifications.clone()))
            .google(GoogleVerifier::new(config.auth.google.clone()))
            .config(config)
            .build()
    }
}

/// Install the process-wide rustls crypto provider. Later calls are no-ops.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Client for outbound calls to Google and the Expo push service.
pub(crate) fn http_client(timeout: std::time::Duration) -> reqwest::Client {
    install_crypto_provider();
    reqwest::Client::builder().timeout(timeout).build().unwrap_or_default()
}

/// Get the listow database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors = &config.auth.security.cors;
    let allow_origin = if cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        if cors.allow_credentials {
            anyhow::bail!("CORS allow_credentials cannot be combined with a '*' origin");
        }
        AllowOrigin::any()
    } else {
        let mut origins = Vec::with_capacity(cors.allowed_origins.len());
        for origin in &cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut layer = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = cors.max_age {
        layer = layer.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(layer)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        // Authentication
        .route("/auth/register", post(auth_handlers::register))
        .route("/auth/login", post(auth_handlers::login))
        .route("/auth/google", post(auth_handlers::google_login))
        .route("/auth/user/{id}", get(auth_handlers::get_user))
        .route("/auth/me", get(auth_handlers::me))
        .route("/auth/profile", put(auth_handlers::update_profile))
        .route("/auth/change-password", put(auth_handlers::change_password))
        .route("/auth/save-token", post(auth_handlers::save_push_token))
        .route("/auth/forgot-password", post(auth_handlers::forgot_password))
        .route("/auth/reset-password", post(auth_handlers::reset_password))
        // Lists and sharing
        .route("/lists", get(lists::list_lists).post(lists::create_list))
        .route("/lists/{id}", put(lists::update_list).delete(lists::delete_list))
        .route("/lists/{id}/share", post(lists::share_list))
        .route("/lists/{id}/collaborators", get(lists::list_collaborators))
        .route("/lists/{id}/collaborators/{collab_id}", axum::routing::delete(lists::remove_collaborator))
        // Items
        .route("/items/list/{list_id}", get(items::list_items).post(items::create_item))
        .route("/items/{id}", put(items::update_item).delete(items::delete_item))
        .route("/items/{id}/toggle", patch(items::toggle_item))
}

/// Build the application router with every route, the uploads directory and the docs.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors_layer = create_cors_layer(&state.config)?;
    let uploads = ServeDir::new(&state.config.uploads.dir);
    let public_path = state.config.uploads.public_path.trim_end_matches('/').to_string();
    let body_limit = state.config.uploads.max_bytes + MULTIPART_OVERHEAD_BYTES;

    let router = Router::new()
        .nest("/api", api_routes())
        .nest_service(&public_path, uploads)
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// Main application struct that owns the router and the database pool.
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Connect to the database, run migrations and build the router.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting listow with configuration: {:#?}", config);

        let database_url = config
            .database_url()
            .context("No database configured. Set DATABASE_URL or database_url in the config file.")?;
        let pool = PgPoolOptions::new().max_connections(20).connect(database_url).await?;
        migrator().run(&pool).await?;

        tokio::fs::create_dir_all(&config.uploads.dir)
            .await
            .with_context(|| format!("Failed to create uploads directory {}", config.uploads.dir.display()))?;

        let router = build_router(AppState::new(pool.clone(), config.clone()))?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Listow listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
