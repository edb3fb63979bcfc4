//! # Lingua API Server
//!
//! HTTP backend of the Lingua language center: course catalog, enrollment,
//! messaging between students and teachers, and the admin back office.
//!
//! ## Architecture
//!
//! The API server is built with Axum and provides:
//! - Sign-in with email/password or Google, stateless JWT sessions
//! - Conversations with membership checked on every call
//! - Password reset by email
//! - Signed, idempotent payment webhooks
//! - Guarded dashboard views
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=memory JWT_SECRET=$(openssl rand -hex 32) cargo run -p lingua-api
//! ```

use lingua_api::{
    app::{build_router, AppState},
    config::Config,
    services::{
        mailer::SmtpMailer,
        oauth::GoogleOAuthProvider,
        relay::HttpFormRelay,
    },
};
use lingua_shared::{
    auth::identity::{seed_user, SeedUser},
    db::{migrations::run_migrations, pool},
    models::user::UserRole,
    store::{memory::MemoryStore, postgres::PgStore, Store},
};
use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Lingua API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let store: Arc<dyn Store> = if config.database.is_memory() {
        tracing::warn!("DATABASE_URL=memory: data lives in this process only");
        Arc::new(MemoryStore::new())
    } else {
        let db = pool::create_pool(pool::DatabaseConfig {
            max_connections: config.database.max_connections,
            ..pool::DatabaseConfig::with_url(config.database.url.clone())
        })
        .await?;
        run_migrations(&db).await?;
        Arc::new(PgStore::new(db))
    };
    tracing::info!(backend = store.backend(), "Storage ready");

    bootstrap_admin(store.as_ref(), &config).await?;

    let mailer = Arc::new(SmtpMailer::new(&config.email)?);
    let relay = Arc::new(HttpFormRelay::new(&config.relay)?);
    let google = match &config.oauth.google {
        Some(google) => Some(Arc::new(GoogleOAuthProvider::new(google.clone())?)),
        None => {
            tracing::info!("Google sign-in disabled (GOOGLE_CLIENT_ID not set)");
            None
        }
    };

    let bind_address = config.bind_address();
    let mut state = AppState::new(store, config, mailer, relay);
    if let Some(google) = google {
        state = state.with_oauth(google);
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// `LOG_FORMAT=json` switches to one JSON object per line
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lingua_api=debug,lingua_shared=info,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Creates the configured admin account unless it already exists
async fn bootstrap_admin(store: &dyn Store, config: &Config) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (
        config.bootstrap.admin_email.as_deref(),
        config.bootstrap.admin_password.as_deref(),
    ) else {
        return Ok(());
    };

    if store.find_user_by_email(email).await?.is_some() {
        tracing::debug!("Admin account already present");
        return Ok(());
    }

    let admin = seed_user(
        store,
        SeedUser {
            email: email.to_string(),
            name: Some("Administrator".to_string()),
            role: UserRole::Admin,
            password: Some(password.to_string()),
            bio: None,
            languages: Vec::new(),
        },
        &config.hashing.params(),
    )
    .await?;

    tracing::info!(user_id = %admin.id, "Created bootstrap admin account");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
