/// Public contact and newsletter forms
///
/// Both forms are validated here and relayed to their spreadsheet endpoint;
/// nothing is stored locally.
///
/// # Endpoints
///
/// - `POST /api/contact` - `{name, email, phone?, subject?, message}`
/// - `POST /api/newsletter` - `{email, name?}`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    routes::{done, NoData, Success},
    services::relay::{FormKind, FormSubmission, RelayError},
};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ContactRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(max = 40, message = "Phone number is too long"))]
    pub phone: Option<String>,

    #[validate(length(max = 200, message = "Subject is too long"))]
    pub subject: Option<String>,

    #[validate(length(min = 1, max = 5000, message = "Message must be between 1 and 5000 characters"))]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct NewsletterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(max = 100, message = "Name is too long"))]
    pub name: Option<String>,
}

async fn relay<T: Serialize>(state: &AppState, kind: FormKind, fields: &T) -> ApiResult<()> {
    let fields = serde_json::to_value(fields)
        .map_err(|e| ApiError::InternalError(format!("Could not encode {} form: {}", kind, e)))?;

    state
        .relay
        .submit(FormSubmission {
            kind,
            fields,
            submitted_at: chrono::Utc::now(),
        })
        .await
        .map_err(|e| match e {
            RelayError::NotConfigured(kind) => {
                tracing::warn!(form = %kind, "Form relay is not configured");
                ApiError::ServiceUnavailable(format!("The {} form is not available right now", kind))
            }
            other => {
                tracing::error!(form = %kind, error = %other, "Form relay failed");
                ApiError::UpstreamFailure(format!("{} relay", kind))
            }
        })
}

/// Relays a contact form submission
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
/// - `429 Too Many Requests`: Rate limit exceeded
/// - `502 Bad Gateway`: Spreadsheet endpoint failed
/// - `503 Service Unavailable`: No endpoint configured
pub async fn contact(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ContactRequest>,
) -> ApiResult<Json<Success<NoData>>> {
    req.validate()?;
    relay(&state, FormKind::Contact, &req).await?;
    Ok(done("Thank you! We will get back to you soon."))
}

/// Relays a newsletter sign-up
///
/// # Errors
///
/// Same as [`contact`].
pub async fn newsletter(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewsletterRequest>,
) -> ApiResult<Json<Success<NoData>>> {
    req.validate()?;
    relay(&state, FormKind::Newsletter, &req).await?;
    Ok(done("You are subscribed to our newsletter."))
}
