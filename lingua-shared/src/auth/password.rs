/// Password hashing with Argon2id
///
/// Hashes are PHC strings (`$argon2id$v=19$m=...`) that embed their own
/// parameters, so verification works across cost changes.
///
/// # Example
///
/// ```
/// use lingua_shared::auth::password::{hash_password_with, verify_password, HashParams};
///
/// let params = HashParams::fast();
/// let hash = hash_password_with("Correct1horse", &params).unwrap();
/// assert!(verify_password("Correct1horse", &hash).unwrap());
/// assert!(!verify_password("wrong", &hash).unwrap());
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, ParamsBuilder, Version,
};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashParams {
    /// Memory in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashParams {
    /// 64 MiB, 3 passes, 4 lanes
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl HashParams {
    /// Minimal cost for tests and local demos
    pub fn fast() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Hashes with the production parameters
///
/// # Errors
///
/// Returns [`PasswordError::HashError`] if Argon2 rejects the input.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with(password, &HashParams::default())
}

/// Hashes with explicit parameters and a fresh random salt
pub fn hash_password_with(password: &str, params: &HashParams) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(params.memory_kib)
        .t_cost(params.iterations)
        .p_cost(params.parallelism)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {e}")))
}

/// Verifies `password` against a stored PHC string
///
/// # Returns
///
/// `Ok(false)` for a wrong password; `Err` only when the stored hash is unusable
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {e}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {e}"))),
    }
}

/// Input hashed by [`dummy_hash`]
const DUMMY_PASSWORD: &str = "lingua-no-such-account";

/// PHC string of [`DUMMY_PASSWORD`], computed once per parameter set
fn dummy_hash(params: &HashParams) -> Option<String> {
    static CACHE: OnceLock<Mutex<HashMap<HashParams, String>>> = OnceLock::new();

    let mut cache = CACHE.get_or_init(Default::default).lock().ok()?;
    if let Some(hash) = cache.get(params) {
        return Some(hash.clone());
    }
    let hash = hash_password_with(DUMMY_PASSWORD, params).ok()?;
    cache.insert(*params, hash.clone());
    Some(hash)
}

/// Spends one full Argon2 verification and reports failure
///
/// Used when there is no stored hash to check, so a missing account costs
/// the same as a wrong password.
pub fn verify_dummy(password: &str, params: &HashParams) -> bool {
    if let Some(hash) = dummy_hash(params) {
        let _ = verify_password(password, &hash);
    }
    false
}

/// Password policy for registration and resets
///
/// At least eight characters with an uppercase letter, a lowercase letter and
/// a digit.
pub fn validate_password_strength(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err("Password must be at least 8 characters long");
    }
    if !password.chars().any(char::is_uppercase) {
        return Err("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(char::is_lowercase) {
        return Err("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit");
    }
    Ok(())
}
