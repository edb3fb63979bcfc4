/// Service error taxonomy
///
/// Every service operation fails with a [`ServiceError`]. The variants are
/// what callers can act on; underlying causes are logged where they happen
/// and replaced by a message that is safe to show to end users.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use validator::ValidationErrors;

use crate::store::StoreError;

/// One rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Sign-in failed; never says whether the account exists
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not authorized: {0}")]
    AuthorizationDenied(String),

    #[error("Validation failed: {} field(s)", .0.len())]
    ValidationFailed(Vec<FieldError>),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream service failure: {0}")]
    UpstreamServiceFailure(String),

    #[error("{0}")]
    Unknown(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// Single-field validation failure
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::ValidationFailed(vec![FieldError::new(field, message)])
    }

    /// Logs `cause` and returns a generic error carrying only `context`
    pub fn internal(context: &str, cause: impl Display) -> Self {
        tracing::error!(error = %cause, "{context}");
        ServiceError::Unknown(context.to_string())
    }

    /// Logs `cause` and returns an upstream failure carrying only `service`
    pub fn upstream(service: &str, cause: impl Display) -> Self {
        tracing::error!(service, error = %cause, "Upstream service call failed");
        ServiceError::UpstreamServiceFailure(service.to_string())
    }
}

/// Flattens `validator` output into per-field messages, sorted by field
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| FieldError {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{field} is invalid")),
            })
        })
        .collect();
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        ServiceError::ValidationFailed(field_errors(&errors))
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ServiceError::NotFound(what.to_string()),
            StoreError::Conflict(what) => ServiceError::Conflict(what),
            StoreError::Database(e) => ServiceError::internal("Database operation failed", e),
            StoreError::Unavailable(reason) => ServiceError::internal("Storage unavailable", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Input {
        #[validate(length(min = 1, message = "Content must not be empty"))]
        content: String,
        #[validate(email)]
        email: String,
    }

    #[test]
    fn test_field_errors_keep_messages() {
        let input = Input {
            content: String::new(),
            email: "not-an-email".to_string(),
        };
        let err: ServiceError = input.validate().unwrap_err().into();
        match err {
            ServiceError::ValidationFailed(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0], FieldError::new("content", "Content must not be empty"));
                assert_eq!(fields[1].field, "email");
                assert_eq!(fields[1].message, "email is invalid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        assert!(matches!(
            ServiceError::from(StoreError::NotFound("Conversation")),
            ServiceError::NotFound(what) if what == "Conversation"
        ));
        assert!(matches!(
            ServiceError::from(StoreError::Conflict("email taken".into())),
            ServiceError::Conflict(_)
        ));
        assert!(matches!(
            ServiceError::from(StoreError::Database(sqlx::Error::PoolTimedOut)),
            ServiceError::Unknown(_)
        ));
    }

    #[test]
    fn test_internal_hides_cause() {
        let err = ServiceError::internal("creation failed", "duplicate key value violates constraint");
        assert_eq!(err.to_string(), "creation failed");
    }
}
