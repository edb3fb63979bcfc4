/// Payment provider webhooks
///
/// Deliveries carry a `Lingua-Signature` header of the form
/// `t=<unix seconds>,v1=<hex>`, where the hex value is an HMAC-SHA256 of
/// `"<t>.<raw body>"` keyed with the shared webhook secret. Several `v1`
/// entries may be present while the secret is being rotated.
///
/// Only `checkout.session.completed` has an effect: it marks the enrollment
/// paid and takes a seat on its schedule, exactly once per event id.
///
/// # Example
///
/// ```
/// use lingua_shared::payments::{signature_header, verify_signature, DEFAULT_TOLERANCE_SECS};
///
/// let body = br#"{"id":"evt_1","type":"ping","data":{}}"#;
/// let header = signature_header("whsec_test", 1_700_000_000, body);
/// assert!(verify_signature(&header, body, "whsec_test", DEFAULT_TOLERANCE_SECS, 1_700_000_100).is_ok());
/// ```

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::token::constant_time_eq;
use crate::error::{ServiceError, ServiceResult};
use crate::store::{CheckoutOutcome, PaymentStore};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Lingua-Signature";

/// Largest accepted distance between the signed timestamp and now
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Signature header missing")]
    Missing,

    #[error("Signature header malformed")]
    Malformed,

    #[error("Signature timestamp outside tolerance")]
    Expired,

    #[error("Signature does not match")]
    Mismatch,
}

/// Hex HMAC-SHA256 of `"<timestamp>.<body>"`
pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Full header value for a delivery signed at `timestamp`
pub fn signature_header(secret: &str, timestamp: i64, body: &[u8]) -> String {
    format!("t={timestamp},v1={}", sign(secret, timestamp, body))
}

/// Checks a `Lingua-Signature` header against the raw request body
///
/// # Arguments
///
/// * `header` - header value as received
/// * `body` - raw body bytes, before any JSON parsing
/// * `secret` - shared webhook secret
/// * `tolerance_secs` - accepted clock skew in either direction
/// * `now` - current unix time in seconds
pub fn verify_signature(
    header: &str,
    body: &[u8],
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?);
            }
            Some(("v1", value)) => candidates.push(value),
            Some(_) => {}
            None => return Err(SignatureError::Malformed),
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    let expected = sign(secret, timestamp, body);
    if candidates
        .iter()
        .any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes()))
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Webhook event envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// `data` of a completed checkout
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutData {
    pub enrollment_id: Uuid,
}

impl PaymentEvent {
    pub fn parse(body: &[u8]) -> ServiceResult<Self> {
        let event: PaymentEvent = serde_json::from_slice(body)
            .map_err(|e| ServiceError::invalid("body", format!("Invalid event payload: {e}")))?;
        if event.id.trim().is_empty() {
            return Err(ServiceError::invalid("id", "Event id must not be empty"));
        }
        Ok(event)
    }

    pub fn checkout_data(&self) -> ServiceResult<CheckoutData> {
        CheckoutData::deserialize(&self.data)
            .map_err(|e| ServiceError::invalid("data.enrollment_id", e.to_string()))
    }
}

/// What handling an event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Checkout(CheckoutOutcome),
    /// Event type without an effect here
    Ignored,
}

/// Applies a verified event
///
/// # Errors
///
/// `NotFound` when a checkout names an unknown enrollment. The event id is
/// not recorded then, so a later redelivery can still apply.
pub async fn handle_event<S: PaymentStore + ?Sized>(
    store: &S,
    event: &PaymentEvent,
) -> ServiceResult<WebhookOutcome> {
    if event.event_type != CHECKOUT_COMPLETED {
        debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring payment event");
        return Ok(WebhookOutcome::Ignored);
    }

    let data = event.checkout_data()?;
    let outcome = store
        .apply_checkout_completed(&event.id, &event.event_type, data.enrollment_id)
        .await?;

    match outcome {
        CheckoutOutcome::Applied {
            schedule_id,
            current_students,
        } => info!(
            event_id = %event.id,
            enrollment_id = %data.enrollment_id,
            %schedule_id,
            current_students,
            "Enrollment paid"
        ),
        CheckoutOutcome::AlreadyProcessed => {
            info!(event_id = %event.id, "Duplicate payment event acknowledged")
        }
        CheckoutOutcome::NotPending(status) => warn!(
            event_id = %event.id,
            enrollment_id = %data.enrollment_id,
            status = status.as_str(),
            "Checkout for enrollment that is not pending"
        ),
        CheckoutOutcome::EnrollmentNotFound => {
            warn!(event_id = %event.id, enrollment_id = %data.enrollment_id, "Checkout for unknown enrollment");
            return Err(ServiceError::NotFound("Enrollment".to_string()));
        }
    }

    Ok(WebhookOutcome::Checkout(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_0123456789abcdef";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_sign_is_hex_sha256() {
        let sig = sign(SECRET, NOW, b"{}");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_verify_valid_signature() {
        let body = br#"{"id":"evt_1"}"#;
        let header = signature_header(SECRET, NOW, body);
        assert_eq!(verify_signature(&header, body, SECRET, DEFAULT_TOLERANCE_SECS, NOW + 10), Ok(()));
    }

    #[test]
    fn test_verify_tampered_body() {
        let header = signature_header(SECRET, NOW, b"original");
        assert_eq!(
            verify_signature(&header, b"tampered", SECRET, DEFAULT_TOLERANCE_SECS, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_verify_wrong_secret() {
        let header = signature_header("another-secret", NOW, b"body");
        assert_eq!(
            verify_signature(&header, b"body", SECRET, DEFAULT_TOLERANCE_SECS, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_verify_outside_tolerance() {
        let header = signature_header(SECRET, NOW, b"body");
        assert_eq!(
            verify_signature(&header, b"body", SECRET, DEFAULT_TOLERANCE_SECS, NOW + 301),
            Err(SignatureError::Expired)
        );
        assert_eq!(
            verify_signature(&header, b"body", SECRET, DEFAULT_TOLERANCE_SECS, NOW - 301),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_verify_extreme_timestamps_are_expired() {
        for timestamp in ["-9223372036854775000", "-9223372036854775808", "9223372036854775807"] {
            let header = format!("t={timestamp},v1=aa");
            assert_eq!(
                verify_signature(&header, b"{}", SECRET, DEFAULT_TOLERANCE_SECS, NOW),
                Err(SignatureError::Expired),
                "{timestamp}"
            );
        }
    }

    #[test]
    fn test_verify_accepts_any_matching_v1() {
        let body = b"body";
        let header = format!("t={NOW},v1=deadbeef,v1={}", sign(SECRET, NOW, body));
        assert!(verify_signature(&header, body, SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_ok());
    }

    #[test]
    fn test_verify_malformed_headers() {
        let timestamp_only = format!("t={NOW}");
        for header in ["", "t=abc,v1=00", "v1=00", timestamp_only.as_str(), "garbage"] {
            assert_eq!(
                verify_signature(header, b"body", SECRET, DEFAULT_TOLERANCE_SECS, NOW),
                Err(SignatureError::Malformed),
                "{header}"
            );
        }
    }

    #[test]
    fn test_parse_event() {
        let id = Uuid::new_v4();
        let body = format!(
            r#"{{"id":"evt_9","type":"checkout.session.completed","data":{{"enrollment_id":"{id}"}}}}"#
        );
        let event = PaymentEvent::parse(body.as_bytes()).unwrap();
        assert_eq!(event.event_type, CHECKOUT_COMPLETED);
        assert_eq!(event.checkout_data().unwrap().enrollment_id, id);
    }

    #[test]
    fn test_parse_event_rejects_garbage() {
        assert!(matches!(
            PaymentEvent::parse(b"not json"),
            Err(ServiceError::ValidationFailed(_))
        ));
        assert!(matches!(
            PaymentEvent::parse(br#"{"id":"","type":"x"}"#),
            Err(ServiceError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_checkout_data_requires_enrollment_id() {
        let event = PaymentEvent::parse(br#"{"id":"evt_2","type":"checkout.session.completed","data":{}}"#).unwrap();
        assert!(event.checkout_data().is_err());
    }
}
