/// Clients for third-party services
///
/// - `mailer`: SMTP email
/// - `relay`: contact and newsletter forms to spreadsheet endpoints
/// - `oauth`: provider sign-in (Google)
///
/// Each client sits behind a trait so tests can swap in a recording double.

pub mod mailer;
pub mod oauth;
pub mod relay;
