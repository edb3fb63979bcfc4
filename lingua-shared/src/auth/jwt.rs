/// Session tokens (HS256 JWT)
///
/// A signed session token is the only session state the server keeps. It
/// carries the user id, role and avatar URL so pages and actions can build a
/// [`SessionContext`](super::session::SessionContext) without a database hit.
///
/// # Claims
///
/// - `sub`: user id
/// - `role`: `STUDENT`, `TEACHER` or `ADMIN`
/// - `image`: avatar URL, if any
/// - `iss`: always `"lingua"`
/// - `iat` / `nbf` / `exp`: Unix timestamps
///
/// # Example
///
/// ```
/// use lingua_shared::auth::jwt::{create_token, validate_token, SessionClaims};
/// use lingua_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// let secret = "a-test-secret-that-is-at-least-32-bytes!";
/// let claims = SessionClaims::new(Uuid::new_v4(), UserRole::Student, None);
/// let token = create_token(&claims, secret).unwrap();
///
/// let decoded = validate_token(&token, secret).unwrap();
/// assert_eq!(decoded.sub, claims.sub);
/// assert_eq!(decoded.role, UserRole::Student);
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::{User, UserRole};

/// Issuer written into and required on every token
pub const ISSUER: &str = "lingua";

/// Default session lifetime
pub const SESSION_TTL_DAYS: i64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token issuer")]
    InvalidIssuer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: Uuid,

    pub role: UserRole,

    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    pub iss: String,

    pub iat: i64,

    pub nbf: i64,

    pub exp: i64,
}

impl SessionClaims {
    /// Claims valid for [`SESSION_TTL_DAYS`]
    pub fn new(user_id: Uuid, role: UserRole, image: Option<String>) -> Self {
        Self::with_lifetime(user_id, role, image, Duration::days(SESSION_TTL_DAYS))
    }

    pub fn with_lifetime(
        user_id: Uuid,
        role: UserRole,
        image: Option<String>,
        lifetime: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            role,
            image,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        }
    }

    /// Claims describing `user` as currently stored
    pub fn for_user(user: &User, lifetime: Duration) -> Self {
        Self::with_lifetime(user.id, user.role, user.image.clone(), lifetime)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs `claims` with HS256
///
/// # Errors
///
/// Returns [`JwtError::CreateError`] if encoding fails.
pub fn create_token(claims: &SessionClaims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {e}")))
}

/// Verifies signature, issuer, `exp` and `nbf`, then returns the claims
///
/// # Errors
///
/// - [`JwtError::Expired`] once `exp` has passed
/// - [`JwtError::InvalidIssuer`] for tokens minted by someone else
/// - [`JwtError::ValidationError`] for anything malformed or forged
pub fn validate_token(token: &str, secret: &str) -> Result<SessionClaims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    decode::<SessionClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
            _ => JwtError::ValidationError(format!("Token validation failed: {e}")),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-that-is-long-enough-for-hs256";

    #[test]
    fn test_claims_defaults() {
        let user_id = Uuid::new_v4();
        let claims = SessionClaims::new(user_id, UserRole::Teacher, Some("https://img/a.png".into()));

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.exp - claims.iat, Duration::days(SESSION_TTL_DAYS).num_seconds());
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_roundtrip_keeps_role_and_image() {
        let claims = SessionClaims::new(Uuid::new_v4(), UserRole::Admin, Some("https://img/b.png".into()));
        let token = create_token(&claims, SECRET).unwrap();
        assert_eq!(token.matches('.').count(), 2);

        let decoded = validate_token(&token, SECRET).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn test_image_is_omitted_when_absent() {
        let claims = SessionClaims::new(Uuid::new_v4(), UserRole::Student, None);
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("image").is_none());
        assert_eq!(json["role"], "STUDENT");
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let claims = SessionClaims::new(Uuid::new_v4(), UserRole::Student, None);
        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(
            validate_token(&token, "another-secret-key-that-is-long-enough"),
            Err(JwtError::ValidationError(_))
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let claims = SessionClaims::with_lifetime(
            Uuid::new_v4(),
            UserRole::Student,
            None,
            Duration::seconds(-300),
        );
        assert!(claims.is_expired());
        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_foreign_issuer_is_rejected() {
        let mut claims = SessionClaims::new(Uuid::new_v4(), UserRole::Student, None);
        claims.iss = "someone-else".to_string();
        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::InvalidIssuer)));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(validate_token("not.a.jwt", SECRET).is_err());
        assert!(validate_token("", SECRET).is_err());
    }
}
