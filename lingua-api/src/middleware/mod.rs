/// Middleware modules for the API server
///
/// This module contains custom middleware for:
/// - Security headers
/// - Session extraction and the page route guard
/// - Rate limiting of public form endpoints

pub mod rate_limit;
pub mod security;
pub mod session;
