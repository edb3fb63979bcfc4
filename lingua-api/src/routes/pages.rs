/// Login and register page descriptors
///
/// Signed-in users never reach these handlers: the route guard sends them to
/// the dashboard first.

use crate::{
    app::AppState,
    extract::ApiQuery,
    routes::{success, Success},
};
use axum::{
    extract::State,
    Json,
};
use lingua_shared::auth::guard::safe_callback;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default, rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthPage {
    pub page: &'static str,

    /// Sign-in methods offered, `credentials` first
    pub providers: Vec<&'static str>,

    /// Where to go after signing in
    pub callback_url: String,
}

fn describe(state: &AppState, page: &'static str, query: &PageQuery) -> AuthPage {
    let mut providers = vec!["credentials"];
    if let Some(provider) = &state.oauth {
        providers.push(provider.name());
    }
    AuthPage {
        page,
        providers,
        callback_url: safe_callback(query.callback_url.as_deref()).to_string(),
    }
}

pub async fn login_page(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Json<Success<AuthPage>> {
    success(describe(&state, "login", &query))
}

pub async fn register_page(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Json<Success<AuthPage>> {
    success(describe(&state, "register", &query))
}
