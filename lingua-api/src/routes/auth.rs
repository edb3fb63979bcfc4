/// Authentication endpoints
///
/// This module provides user authentication endpoints:
/// - Registration (always a STUDENT account)
/// - Login with email and password
/// - Logout
/// - Reading and refreshing the session token
/// - Google sign-in
///
/// # Endpoints
///
/// - `POST /api/auth/register` - Register and sign in
/// - `POST /api/auth/login` - Sign in with email and password
/// - `POST /api/auth/logout` - Clear the session cookie
/// - `GET  /api/auth/session` - Current session
/// - `POST /api/auth/session` - Re-issue the token from the stored account
/// - `GET  /api/auth/oauth/google` - Redirect to Google's consent page
/// - `GET  /api/auth/oauth/google/callback` - Finish Google sign-in
///
/// Every successful sign-in sets the `lingua_session` cookie and also returns
/// the token in the body for API clients.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiQuery},
    middleware::session::{clear_session_cookie, session_cookie, AuthSession},
    routes::{done, Success},
    services::oauth::OAuthError,
};
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use lingua_shared::{
    auth::{
        guard::safe_callback,
        identity::{
            issue_session, refresh_session as refresh_account, register as register_account,
            CredentialResolver, PasswordCredentials, PasswordResolver, ProviderResolver,
            Registration,
        },
        session::SessionContext,
        token::{constant_time_eq, generate_token},
    },
    models::user::{UpdateProfile, User, UserRole},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Cookie carrying the OAuth `state` and the post-login target
const OAUTH_STATE_COOKIE: &str = "lingua_oauth_state";

/// Seconds the user has to finish the provider consent page
const OAUTH_STATE_MAX_AGE: i64 = 600;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked against the password policy before hashing
    #[validate(length(min = 8, max = 128, message = "Password must be between 8 and 128 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,

    #[serde(default, rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    #[serde(default, rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

/// Optional profile changes applied before a session refresh
#[derive(Debug, Default, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,

    #[validate(url(message = "Image must be a URL"))]
    pub image: Option<String>,
}

/// The signed-in account as returned to its owner
#[derive(Debug, Serialize)]
pub struct AccountView {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub role: UserRole,
}

impl From<&User> for AccountView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            image: user.image.clone(),
            role: user.role,
        }
    }
}

/// Body of every response that starts or renews a session
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: AccountView,

    /// Session token (HS256 JWT)
    pub token: String,

    /// Unix timestamp
    pub expires_at: i64,

    /// Where the client should navigate next
    pub redirect: String,
}

#[derive(Debug, Serialize)]
pub struct CurrentSessionResponse {
    pub session: SessionContext,
}

#[derive(Debug, Deserialize)]
pub struct OAuthStartQuery {
    #[serde(default, rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Signs `user` in: token, cookie header and response body
fn start_session(
    state: &AppState,
    user: &User,
    callback_url: Option<&str>,
) -> ApiResult<(HeaderValue, SessionResponse)> {
    let (token, claims) = issue_session(user, state.jwt_secret(), state.session_lifetime())?;
    let cookie = session_cookie(&token, state.config.jwt.ttl_days, state.secure_cookies())?;

    Ok((
        cookie,
        SessionResponse {
            user: AccountView::from(user),
            token,
            expires_at: claims.exp,
            redirect: safe_callback(callback_url).to_string(),
        },
    ))
}

/// Register a new student account
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/register
/// Content-Type: application/json
///
/// {
///   "email": "ana@example.com",
///   "password": "SecureP4ss",
///   "name": "Ana"
/// }
/// ```
///
/// # Response
///
/// `201 Created` with a [`SessionResponse`] and the session cookie.
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed or weak password
/// - `409 Conflict`: Email already exists
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<Response> {
    req.validate()?;

    let user = register_account(
        &*state.store,
        Registration {
            email: req.email,
            password: req.password,
            name: req.name,
        },
        &state.hash_params(),
    )
    .await?;

    let (cookie, body) = start_session(&state, &user, req.callback_url.as_deref())?;

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(Success::new(body).with_message("Account created")),
    )
        .into_response())
}

/// Login with email and password
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/login
/// Content-Type: application/json
///
/// {
///   "email": "ana@example.com",
///   "password": "SecureP4ss",
///   "callbackUrl": "/dashboard/messages"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Missing fields
/// - `401 Unauthorized`: "Invalid email or password", whatever the cause
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Response> {
    req.validate()?;

    let user = PasswordResolver::new(&*state.store)
        .with_params(state.hash_params())
        .resolve(PasswordCredentials {
            email: req.email,
            password: req.password,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User signed in");

    let (cookie, body) = start_session(&state, &user, req.callback_url.as_deref())?;
    Ok(([(header::SET_COOKIE, cookie)], Json(Success::new(body))).into_response())
}

/// Clears the session cookie
///
/// Tokens are stateless, so a copied bearer token stays valid until it expires.
pub async fn logout(State(state): State<AppState>) -> Response {
    (
        [(header::SET_COOKIE, clear_session_cookie(state.secure_cookies()))],
        done("Signed out"),
    )
        .into_response()
}

/// Returns the verified session of the caller
///
/// # Errors
///
/// - `401 Unauthorized`: No valid session
pub async fn current_session(AuthSession(session): AuthSession) -> Json<Success<CurrentSessionResponse>> {
    Json(Success::new(CurrentSessionResponse { session }))
}

/// Re-issues the session token from the stored account
///
/// Applies the optional `name`/`image` changes first, so the new token
/// carries the current role and avatar.
///
/// # Errors
///
/// - `400 Bad Request`: Invalid profile fields
/// - `401 Unauthorized`: No valid session, or the account no longer exists
pub async fn refresh_session(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    body: Option<ApiJson<RefreshRequest>>,
) -> ApiResult<Response> {
    let req = body.map(|ApiJson(req)| req).unwrap_or_default();
    req.validate()?;

    let user = refresh_account(
        &*state.store,
        &session,
        UpdateProfile {
            name: req.name,
            image: req.image,
        },
    )
    .await?;

    let (cookie, body) = start_session(&state, &user, None)?;
    Ok(([(header::SET_COOKIE, cookie)], Json(Success::new(body))).into_response())
}

/// Starts Google sign-in
///
/// Stores a random `state` in a short-lived cookie and redirects (303) to the
/// provider's consent page.
///
/// # Errors
///
/// - `503 Service Unavailable`: Google sign-in is not configured
pub async fn oauth_start(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<OAuthStartQuery>,
) -> ApiResult<Response> {
    let provider = state
        .oauth
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Google sign-in is not configured".to_string()))?;

    let nonce = generate_token();
    let callback = safe_callback(query.callback_url.as_deref());
    let secure = if state.secure_cookies() { "; Secure" } else { "" };
    let cookie = HeaderValue::from_str(&format!(
        "{OAUTH_STATE_COOKIE}={nonce}.{}; Path=/api/auth/oauth; HttpOnly; SameSite=Lax; Max-Age={OAUTH_STATE_MAX_AGE}{secure}",
        urlencoding::encode(callback)
    ))
    .map_err(|e| ApiError::InternalError(format!("Invalid state cookie: {}", e)))?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Redirect::to(&provider.authorization_url(&nonce)),
    )
        .into_response())
}

/// Finishes Google sign-in
///
/// Checks `state` against the cookie, exchanges the code for a verified
/// profile, finds or creates the local account and redirects (303) to the
/// original callback with the session cookie set.
///
/// # Errors
///
/// - `400 Bad Request`: Provider error, missing code or state mismatch
/// - `401 Unauthorized`: Provider email not verified
/// - `502 Bad Gateway`: Provider call failed
/// - `503 Service Unavailable`: Google sign-in is not configured
pub async fn oauth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiQuery(query): ApiQuery<OAuthCallbackQuery>,
) -> ApiResult<Response> {
    let provider = state
        .oauth
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Google sign-in is not configured".to_string()))?;

    if let Some(error) = query.error.as_deref() {
        tracing::warn!(provider = provider.name(), %error, "Provider returned an error");
        return Err(ApiError::BadRequest("Sign-in was cancelled or refused".to_string()));
    }

    let stored = jar
        .get(OAUTH_STATE_COOKIE)
        .map(|c| c.value().to_string())
        .unwrap_or_default();
    let (expected, callback) = stored.split_once('.').unwrap_or(("", ""));
    let received = query.state.as_deref().unwrap_or_default();
    if expected.is_empty() || !constant_time_eq(expected.as_bytes(), received.as_bytes()) {
        return Err(ApiError::BadRequest("Invalid sign-in state".to_string()));
    }

    let code = query
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing authorization code".to_string()))?;

    let profile = provider.exchange_code(code).await.map_err(|e| match e {
        OAuthError::UnverifiedEmail => ApiError::Unauthorized(e.to_string()),
        other => {
            tracing::error!(provider = provider.name(), error = %other, "OAuth code exchange failed");
            ApiError::UpstreamFailure(provider.name().to_string())
        }
    })?;

    let user = ProviderResolver::new(&*state.store).resolve(profile).await?;
    tracing::info!(user_id = %user.id, provider = provider.name(), "User signed in with provider");

    let callback = urlencoding::decode(callback)
        .map(|c| c.into_owned())
        .unwrap_or_default();
    let (cookie, body) = start_session(&state, &user, Some(&callback))?;
    let clear_state = HeaderValue::from_static("lingua_oauth_state=; Path=/api/auth/oauth; Max-Age=0");

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie), (header::SET_COOKIE, clear_state)]),
        Redirect::to(&body.redirect),
    )
        .into_response())
}
