/// Session extraction and the page guard
///
/// [`session_layer`] runs on every request. It reads the signed session token
/// from the `lingua_session` cookie or an `Authorization: Bearer` header and,
/// when it verifies, stores a [`SessionContext`] in the request extensions.
/// An invalid or expired token is treated as no session at all.
///
/// Handlers get the context through the [`Session`] and [`AuthSession`]
/// extractors. Page routes additionally sit behind [`page_guard_layer`],
/// which answers with a 303 redirect when the guard says so.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use lingua_shared::auth::{
    guard,
    jwt::{self, JwtError},
    session::{bearer_token, SessionContext},
};

use crate::app::AppState;
use crate::error::ApiError;

/// Name of the cookie holding the session token
pub const SESSION_COOKIE: &str = "lingua_session";

/// Picks the session token, preferring an explicit bearer header
fn session_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string)
        .or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
        .filter(|t| !t.is_empty())
}

/// Verifies the session token, if any, and exposes the session to handlers
pub async fn session_layer(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(token) = session_token(req.headers(), &jar) {
        match jwt::validate_token(&token, state.jwt_secret()) {
            Ok(claims) => {
                req.extensions_mut().insert(SessionContext::from(claims));
            }
            Err(JwtError::Expired) => tracing::debug!("Ignoring expired session token"),
            Err(e) => tracing::debug!(error = %e, "Ignoring invalid session token"),
        }
    }

    next.run(req).await
}

/// Redirects page requests the route guard does not let through
pub async fn page_guard_layer(req: Request, next: Next) -> Response {
    let role = req.extensions().get::<SessionContext>().map(|s| s.role);
    let decision = guard::decide(role, req.uri().path(), req.uri().query());

    match decision.location() {
        Some(location) => {
            tracing::debug!(path = %req.uri().path(), %location, "Route guard redirect");
            Redirect::to(&location).into_response()
        }
        None => next.run(req).await,
    }
}

/// `Set-Cookie` value that stores `token` for `ttl_days`
pub fn session_cookie(token: &str, ttl_days: i64, secure: bool) -> Result<HeaderValue, ApiError> {
    let max_age = ttl_days.max(0) * 24 * 60 * 60;
    let secure = if secure { "; Secure" } else { "" };
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}{secure}"
    ))
    .map_err(|e| ApiError::InternalError(format!("Invalid session cookie: {}", e)))
}

/// `Set-Cookie` value that deletes the session cookie
pub fn clear_session_cookie(secure: bool) -> HeaderValue {
    if secure {
        HeaderValue::from_static("lingua_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Secure")
    } else {
        HeaderValue::from_static("lingua_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
    }
}

/// The caller's session, if the request carried a valid one
#[derive(Debug, Clone)]
pub struct Session(pub Option<SessionContext>);

impl Session {
    pub fn get(&self) -> Option<&SessionContext> {
        self.0.as_ref()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Session(parts.extensions.get::<SessionContext>().cloned()))
    }
}

/// A session that must be present; rejects with 401 otherwise
#[derive(Debug, Clone)]
pub struct AuthSession(pub SessionContext);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .map(AuthSession)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }
}
