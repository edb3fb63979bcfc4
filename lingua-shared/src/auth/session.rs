/// Per-request session context
///
/// Built once per request from a verified [`SessionClaims`] and handed
/// explicitly to every service call that needs to know who is calling.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::SessionClaims;
use crate::error::ServiceError;
use crate::models::user::UserRole;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub user_id: Uuid,
    pub role: UserRole,
    pub image: Option<String>,
}

impl SessionContext {
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self {
            user_id,
            role,
            image: None,
        }
    }

    pub fn from_claims(claims: &SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
            image: claims.image.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<SessionClaims> for SessionContext {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
            image: claims.image,
        }
    }
}

/// Unwraps an optional session, failing with `AuthenticationRequired`
pub fn require_session(session: Option<&SessionContext>) -> Result<&SessionContext, ServiceError> {
    session.ok_or(ServiceError::AuthenticationRequired)
}

/// Requires the caller's role to be one of `allowed`
pub fn require_role(session: &SessionContext, allowed: &[UserRole]) -> Result<(), ServiceError> {
    if allowed.contains(&session.role) {
        Ok(())
    } else {
        Err(ServiceError::AuthorizationDenied(format!(
            "role {} may not perform this action",
            session.role
        )))
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
