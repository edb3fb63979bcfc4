/// Password reset flow
///
/// 1. [`request_password_reset`] issues a token for a known email. The caller
///    mails the plaintext; only its digest is stored.
/// 2. [`validate_reset_token`] answers whether a link is still usable.
/// 3. [`confirm_password_reset`] sets the new password and burns the token.
///
/// Unknown emails are not an error: callers must answer both cases the same way.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::password::{hash_password_with, validate_password_strength, HashParams};
use super::token::{generate_token, hash_token, is_well_formed};
use crate::error::{ServiceError, ServiceResult};
use crate::models::user::User;
use crate::store::{PasswordResetStore, UserStore};

/// How long an issued reset link stays valid
pub const TOKEN_EXPIRY_MINUTES: i64 = 60;

/// A freshly issued token; `token` must only ever leave through email
#[derive(Debug, Clone)]
pub struct IssuedReset {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues a reset token when `email` belongs to an account
///
/// Any token issued earlier for the same user stops working.
///
/// # Returns
///
/// `None` when no account uses the email
pub async fn request_password_reset<S>(store: &S, email: &str) -> ServiceResult<Option<IssuedReset>>
where
    S: UserStore + PasswordResetStore + ?Sized,
{
    let Some(user) = store.find_user_by_email(email.trim()).await? else {
        debug!("Password reset requested for unknown email");
        return Ok(None);
    };

    let token = generate_token();
    let expires_at = Utc::now() + Duration::minutes(TOKEN_EXPIRY_MINUTES);
    store
        .replace_reset_token(user.id, &hash_token(&token), expires_at)
        .await?;

    info!(user_id = %user.id, %expires_at, "Issued password reset token");
    Ok(Some(IssuedReset {
        user,
        token,
        expires_at,
    }))
}

/// A token is valid while its digest is stored and it has not expired
pub async fn validate_reset_token<S>(store: &S, token: &str) -> ServiceResult<bool>
where
    S: PasswordResetStore + ?Sized,
{
    if !is_well_formed(token) {
        return Ok(false);
    }
    let stored = store.find_reset_token(&hash_token(token)).await?;
    Ok(stored.is_some_and(|t| !t.is_expired()))
}

/// Sets a new password using a reset token, consuming the token
///
/// # Errors
///
/// - `ValidationFailed` on `password` for a weak password
/// - `ValidationFailed` on `token` for unknown, used, superseded or expired tokens
pub async fn confirm_password_reset<S>(
    store: &S,
    token: &str,
    new_password: &str,
    params: &HashParams,
) -> ServiceResult<()>
where
    S: PasswordResetStore + ?Sized,
{
    validate_password_strength(new_password)
        .map_err(|msg| ServiceError::invalid("password", msg))?;

    if !is_well_formed(token) {
        return Err(invalid_token());
    }

    let password_hash = hash_password_with(new_password, params)
        .map_err(|e| ServiceError::internal("Could not hash password", e))?;

    match store
        .consume_reset_token(&hash_token(token), &password_hash, Utc::now())
        .await?
    {
        Some(user_id) => {
            info!(%user_id, "Password reset completed");
            Ok(())
        }
        None => Err(invalid_token()),
    }
}

fn invalid_token() -> ServiceError {
    ServiceError::invalid("token", "Reset link is invalid or has expired")
}
