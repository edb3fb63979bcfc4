/// Password reset endpoints
///
/// - `POST /api/auth/password-reset` - Email a reset link
/// - `GET  /api/auth/password-reset/validate?token=` - Check a link before showing the form
/// - `POST /api/auth/password-reset/confirm` - Set a new password
///
/// The request endpoint answers the same way whether or not the email
/// belongs to an account.

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{ApiJson, ApiQuery},
    routes::{done, success, NoData, Success},
    services::mailer::OutgoingEmail,
};
use axum::{
    extract::State,
    Json,
};
use lingua_shared::auth::reset::{confirm_password_reset, request_password_reset, validate_reset_token};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Shown for every reset request
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for this email, a reset link has been sent";

#[derive(Debug, Deserialize, Validate)]
pub struct ResetRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmResetRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(min = 8, max = 128, message = "Password must be between 8 and 128 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

/// Issues a reset token and emails the link
///
/// A mail delivery failure is logged but not reported, since reporting it
/// would reveal that the account exists.
///
/// # Errors
///
/// - `400 Bad Request`: Invalid email format
/// - `429 Too Many Requests`: Rate limit exceeded
pub async fn request_reset(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetRequest>,
) -> ApiResult<Json<Success<NoData>>> {
    req.validate()?;

    if let Some(issued) = request_password_reset(&*state.store, &req.email).await? {
        let link = format!(
            "{}/reset-password?token={}",
            state.config.api.public_url,
            urlencoding::encode(&issued.token)
        );
        let email = OutgoingEmail::password_reset(&issued.user.email, issued.user.name.as_deref(), &link);

        if let Err(e) = state.mailer.send(email).await {
            tracing::error!(user_id = %issued.user.id, error = %e, "Failed to send password reset email");
        }
    }

    Ok(done(RESET_REQUESTED_MESSAGE))
}

/// Reports whether a reset token can still be used
pub async fn validate_reset(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ValidateQuery>,
) -> ApiResult<Json<Success<ValidateResponse>>> {
    let valid = validate_reset_token(&*state.store, &query.token).await?;
    Ok(success(ValidateResponse { valid }))
}

/// Sets a new password and consumes the token
///
/// # Errors
///
/// - `400 Bad Request`: Weak password, or the token is unknown, used,
///   superseded or expired
/// - `429 Too Many Requests`: Rate limit exceeded
pub async fn confirm_reset(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ConfirmResetRequest>,
) -> ApiResult<Json<Success<NoData>>> {
    req.validate()?;

    confirm_password_reset(&*state.store, &req.token, &req.password, &state.hash_params()).await?;

    Ok(done("Your password has been updated. You can now sign in."))
}
