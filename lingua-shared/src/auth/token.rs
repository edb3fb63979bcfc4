/// Opaque single-use tokens
///
/// Password-reset links carry a random token. Only its SHA-256 digest is
/// stored, so a leaked table cannot be replayed.
///
/// # Example
///
/// ```
/// use lingua_shared::auth::token::{generate_token, hash_token, verify_token, TOKEN_LENGTH};
///
/// let token = generate_token();
/// assert_eq!(token.len(), TOKEN_LENGTH);
///
/// let digest = hash_token(&token);
/// assert!(verify_token(&token, &digest));
/// assert!(!verify_token("something-else", &digest));
/// ```

use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

/// Length of a generated token (base62 characters)
pub const TOKEN_LENGTH: usize = 32;

/// Generates a random base62 token
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Hex-encoded SHA-256 digest of `token`
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Checks `token` against a stored digest without short-circuiting
pub fn verify_token(token: &str, stored_hash: &str) -> bool {
    constant_time_eq(hash_token(token).as_bytes(), stored_hash.as_bytes())
}

/// Byte comparison whose running time does not depend on where inputs differ
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Tokens only ever contain base62 characters of the expected length
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH && token.chars().all(|c| c.is_ascii_alphanumeric())
}
