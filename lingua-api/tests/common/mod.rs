//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - An app over the in-memory store with fast password hashing
//! - Recording doubles for the mailer, form relay and OAuth provider
//! - User creation and session token generation
//! - Request helpers returning status, headers and parsed JSON
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use lingua_api::app::{build_router, AppState};
use lingua_api::config::Config;
use lingua_api::services::mailer::{MailError, Mailer, OutgoingEmail};
use lingua_api::services::oauth::{OAuthError, OAuthProvider};
use lingua_api::services::relay::{FormRelay, FormSubmission, RelayError};
use lingua_shared::auth::identity::{issue_session, seed_user, ProviderProfile, SeedUser};
use lingua_shared::auth::password::HashParams;
use lingua_shared::models::user::{User, UserRole};
use lingua_shared::store::memory::MemoryStore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const PASSWORD: &str = "Password123";

/// Mailer that keeps every message instead of sending it
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        self.sent.lock().await.push(email);
        Ok(())
    }
}

/// Relay that keeps every submission
#[derive(Default)]
pub struct RecordingRelay {
    pub submissions: Mutex<Vec<FormSubmission>>,
}

#[async_trait]
impl FormRelay for RecordingRelay {
    async fn submit(&self, submission: FormSubmission) -> Result<(), RelayError> {
        self.submissions.lock().await.push(submission);
        Ok(())
    }
}

/// Provider accepting only the code `good-code`
pub struct StubProvider {
    pub profile: ProviderProfile,
}

#[async_trait]
impl OAuthProvider for StubProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn authorization_url(&self, state: &str) -> String {
        format!("https://accounts.example/consent?state={state}")
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderProfile, OAuthError> {
        if code == "good-code" {
            Ok(self.profile.clone())
        } else {
            Err(OAuthError::TokenExchange("bad code".to_string()))
        }
    }
}

/// Response pieces tests look at
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Every `Set-Cookie` value
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all("set-cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    /// `name=value` pair of the cookie called `name`, ready for a `Cookie` header
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.set_cookies()
            .into_iter()
            .find(|c| c.starts_with(&format!("{name}=")))
            .and_then(|c| c.split(';').next().map(str::to_string))
    }
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub relay: Arc<RecordingRelay>,
    pub app: axum::Router,
    pub config: Config,
}

pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let fast = HashParams::fast();
    let memory = fast.memory_kib.to_string();
    let iterations = fast.iterations.to_string();
    let parallelism = fast.parallelism.to_string();

    let mut vars: HashMap<String, String> = [
        ("DATABASE_URL", "memory"),
        ("JWT_SECRET", JWT_SECRET),
        ("PUBLIC_URL", "https://lingua.test"),
        ("PAYMENT_WEBHOOK_SECRET", WEBHOOK_SECRET),
        ("FORM_RATE_LIMIT_PER_MINUTE", "100"),
        ("ARGON2_MEMORY_KIB", memory.as_str()),
        ("ARGON2_ITERATIONS", iterations.as_str()),
        ("ARGON2_PARALLELISM", parallelism.as_str()),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(test_config(&[]), None)
    }

    /// Context whose Google sign-in returns `profile`
    pub fn with_google(profile: ProviderProfile) -> Self {
        Self::with_config(test_config(&[]), Some(Arc::new(StubProvider { profile })))
    }

    pub fn with_config(config: Config, oauth: Option<Arc<StubProvider>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let relay = Arc::new(RecordingRelay::default());

        let mut state = AppState::new(store.clone(), config.clone(), mailer.clone(), relay.clone());
        if let Some(provider) = oauth {
            state = state.with_oauth(provider);
        }

        TestContext {
            store,
            mailer,
            relay,
            app: build_router(state),
            config,
        }
    }

    /// Creates a user with [`PASSWORD`] and its role profile
    pub async fn user(&self, email: &str, role: UserRole) -> User {
        seed_user(
            self.store.as_ref(),
            SeedUser {
                email: email.to_string(),
                name: Some(email.split('@').next().unwrap_or(email).to_string()),
                role,
                password: Some(PASSWORD.to_string()),
                bio: None,
                languages: Vec::new(),
            },
            &HashParams::fast(),
        )
        .await
        .unwrap()
    }

    pub fn token_for(&self, user: &User) -> String {
        issue_session(user, JWT_SECRET, chrono::Duration::days(1)).unwrap().0
    }

    /// Sends a request; `token` goes in a bearer header, `body` as JSON
    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.call(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send("POST", uri, token, Some(body)).await
    }

    pub async fn call(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse { status, headers, body }
    }
}

/// Creates a course and one schedule through the admin API
///
/// # Returns
///
/// `(course slug, schedule id)`
pub async fn course_with_schedule(ctx: &TestContext, admin_token: &str, slug: &str, seats: i32) -> (String, String) {
    let course = ctx
        .post(
            "/api/admin/courses",
            Some(admin_token),
            serde_json::json!({
                "slug": slug,
                "title": "Spanish for Beginners",
                "language": "Spanish",
                "level": "A1",
                "description": "Ten evenings of conversation",
                "price_cents": 19900
            }),
        )
        .await;
    assert_eq!(course.status, StatusCode::CREATED, "{}", course.body);

    let schedule = ctx
        .post(
            "/api/admin/schedules",
            Some(admin_token),
            serde_json::json!({
                "course_id": course.body["course"]["id"],
                "starts_at": "2030-03-01T18:00:00Z",
                "ends_at": "2030-05-01T20:00:00Z",
                "max_students": seats,
                "location": "Room 2"
            }),
        )
        .await;
    assert_eq!(schedule.status, StatusCode::CREATED, "{}", schedule.body);

    let schedule_id = schedule.body["schedule"]["id"].as_str().unwrap().to_string();
    (slug.to_string(), schedule_id)
}
