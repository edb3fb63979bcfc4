/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use lingua_api::app::{build_router, AppState};
/// use lingua_api::config::Config;
/// use lingua_api::services::{mailer::SmtpMailer, relay::HttpFormRelay};
/// use lingua_shared::store::memory::MemoryStore;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let mailer = SmtpMailer::new(&config.email)?;
/// let relay = HttpFormRelay::new(&config.relay)?;
/// let state = AppState::new(Arc::new(MemoryStore::new()), config, Arc::new(mailer), Arc::new(relay));
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{rate_limit::RateLimiter, security::SecurityHeadersLayer, session},
    services::{mailer::Mailer, oauth::OAuthProvider, relay::FormRelay},
};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use lingua_shared::auth::password::HashParams;
use lingua_shared::store::Store;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Persistence gateway (PostgreSQL or in-memory)
    pub store: Arc<dyn Store>,

    /// Application configuration
    pub config: Arc<Config>,

    pub mailer: Arc<dyn Mailer>,

    /// Contact and newsletter forms
    pub relay: Arc<dyn FormRelay>,

    /// Google sign-in, when configured
    pub oauth: Option<Arc<dyn OAuthProvider>>,

    /// Buckets for the public form endpoints
    pub form_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Creates new application state
    pub fn new(
        store: Arc<dyn Store>,
        config: Config,
        mailer: Arc<dyn Mailer>,
        relay: Arc<dyn FormRelay>,
    ) -> Self {
        let form_limiter = Arc::new(RateLimiter::per_minute(config.rate_limit.forms_per_minute));
        Self {
            store,
            config: Arc::new(config),
            mailer,
            relay,
            oauth: None,
            form_limiter,
        }
    }

    pub fn with_oauth(mut self, provider: Arc<dyn OAuthProvider>) -> Self {
        self.oauth = Some(provider);
        self
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    pub fn session_lifetime(&self) -> chrono::Duration {
        chrono::Duration::days(self.config.jwt.ttl_days)
    }

    pub fn hash_params(&self) -> HashParams {
        self.config.hashing.params()
    }

    /// Whether cookies must carry the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.config.api.production
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /health
/// ├── /api/
/// │   ├── /auth/
/// │   │   ├── POST /register, /login, /logout
/// │   │   ├── GET|POST /session           # read or refresh the session token
/// │   │   ├── GET  /oauth/google, /oauth/google/callback
/// │   │   └── POST /password-reset, /password-reset/confirm
/// │   │       GET  /password-reset/validate
/// │   ├── POST /contact, /newsletter      # rate limited
/// │   ├── POST /webhooks/payments         # signed
/// │   ├── GET  /courses, /courses/:slug, /posts, /posts/:slug
/// │   ├── GET|POST /enrollments
/// │   ├── GET|POST /conversations
/// │   ├── GET  /conversations/:id
/// │   ├── POST /conversations/:id/messages
/// │   └── POST /admin/users, /admin/courses, /admin/schedules, /admin/posts
/// └── pages (route guard)
///     ├── GET /login, /register
///     ├── GET /dashboard, /dashboard/messages, /dashboard/messages/:id
///     ├── GET /dashboard/teacher
///     └── GET /dashboard/admin/students, /teachers, /enrollments
/// ```
///
/// # Middleware Stack
///
/// Outermost first:
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Response compression
/// 5. Session extraction (every route)
/// 6. Route guard (pages) or rate limiting (public forms)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Public form endpoints (rate limited per client IP)
    let form_routes = Router::new()
        .route("/contact", post(routes::forms::contact))
        .route("/newsletter", post(routes::forms::newsletter))
        .route("/auth/password-reset", post(routes::password_reset::request_reset))
        .route(
            "/auth/password-reset/confirm",
            post(routes::password_reset::confirm_reset),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::rate_limit::rate_limit_layer,
        ));

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/logout", post(routes::auth::logout))
        .route(
            "/session",
            get(routes::auth::current_session).post(routes::auth::refresh_session),
        )
        .route("/oauth/google", get(routes::auth::oauth_start))
        .route("/oauth/google/callback", get(routes::auth::oauth_callback))
        .route(
            "/password-reset/validate",
            get(routes::password_reset::validate_reset),
        );

    let catalog_routes = Router::new()
        .route("/courses", get(routes::catalog::list_courses))
        .route("/courses/:slug", get(routes::catalog::get_course))
        .route("/posts", get(routes::catalog::list_posts))
        .route("/posts/:slug", get(routes::catalog::get_post))
        .route(
            "/enrollments",
            get(routes::catalog::my_enrollments).post(routes::catalog::enroll),
        );

    let conversation_routes = Router::new()
        .route(
            "/",
            get(routes::conversations::list_conversations)
                .post(routes::conversations::create_conversation),
        )
        .route("/:id", get(routes::conversations::get_conversation))
        .route("/:id/messages", post(routes::conversations::send_message));

    let admin_routes = Router::new()
        .route("/users", post(routes::admin::create_user))
        .route("/courses", post(routes::admin::create_course))
        .route("/schedules", post(routes::admin::create_schedule))
        .route("/posts", post(routes::admin::create_post));

    let api_routes = Router::new()
        .merge(form_routes)
        .merge(catalog_routes)
        .nest("/auth", auth_routes)
        .nest("/conversations", conversation_routes)
        .nest("/admin", admin_routes)
        .route("/webhooks/payments", post(routes::webhooks::payments));

    // Server-rendered page data, behind the route guard
    let page_routes = Router::new()
        .route("/login", get(routes::pages::login_page))
        .route("/register", get(routes::pages::register_page))
        .route("/dashboard", get(routes::dashboard::home))
        .route("/dashboard/messages", get(routes::dashboard::messages))
        .route("/dashboard/messages/:id", get(routes::dashboard::conversation))
        .route("/dashboard/teacher", get(routes::dashboard::teacher))
        .route("/dashboard/admin/students", get(routes::dashboard::admin_students))
        .route("/dashboard/admin/teachers", get(routes::dashboard::admin_teachers))
        .route(
            "/dashboard/admin/enrollments",
            get(routes::dashboard::admin_enrollments),
        )
        .route_layer(axum::middleware::from_fn(session::page_guard_layer));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .merge(page_routes)
        .nest("/api", api_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session::session_layer,
        ))
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
