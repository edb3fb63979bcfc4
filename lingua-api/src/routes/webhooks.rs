/// Payment provider webhook
///
/// # Endpoint
///
/// ```text
/// POST /api/webhooks/payments
/// Lingua-Signature: t=1700000000,v1=5257a869...
///
/// {"id": "evt_123", "type": "checkout.session.completed", "data": {"enrollment_id": "uuid"}}
/// ```
///
/// The signature is checked against the raw body before anything is parsed.
/// Redeliveries of an event that was already applied are acknowledged with
/// 200 and change nothing.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{done, NoData, Success},
};
use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use lingua_shared::payments::{handle_event, verify_signature, PaymentEvent, SignatureError, WebhookOutcome, SIGNATURE_HEADER};
use lingua_shared::store::CheckoutOutcome;

/// Verifies and applies a payment event
///
/// # Errors
///
/// - `400 Bad Request`: Missing or invalid signature, or malformed event
/// - `404 Not Found`: The event names an unknown enrollment (not recorded, so a retry can apply it)
/// - `503 Service Unavailable`: No webhook secret configured
pub async fn payments(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Success<NoData>>> {
    let secret = state.config.payments.webhook_secret.as_deref().ok_or_else(|| {
        tracing::error!("Payment webhook received but PAYMENT_WEBHOOK_SECRET is not set");
        ApiError::ServiceUnavailable("Payment webhooks are not configured".to_string())
    })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(SignatureError::Missing)?;

    verify_signature(
        signature,
        &body,
        secret,
        state.config.payments.tolerance_seconds,
        chrono::Utc::now().timestamp(),
    )?;

    let event = PaymentEvent::parse(&body)?;
    let message = match handle_event(&*state.store, &event).await? {
        WebhookOutcome::Checkout(CheckoutOutcome::Applied { .. }) => "Payment recorded",
        WebhookOutcome::Checkout(CheckoutOutcome::AlreadyProcessed) => "Event already processed",
        WebhookOutcome::Checkout(_) => "Event acknowledged",
        WebhookOutcome::Ignored => "Event ignored",
    };

    Ok(done(message))
}
