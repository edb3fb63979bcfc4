/// Authentication primitives
///
/// # Modules
///
/// - [`password`]: Argon2id hashing and the password policy
/// - [`jwt`]: signed session tokens carrying id, role and avatar
/// - [`session`]: the per-request [`session::SessionContext`] and role checks
/// - [`token`]: random single-use tokens stored as SHA-256 digests
/// - [`identity`]: credential resolution for password and provider sign-in
/// - [`guard`]: redirect decisions for protected pages
/// - [`reset`]: the password-reset flow

pub mod guard;
pub mod identity;
pub mod jwt;
pub mod password;
pub mod reset;
pub mod session;
pub mod token;
