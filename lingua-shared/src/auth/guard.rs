/// Route guard for server-rendered pages
///
/// A stateless decision over "does the request carry a valid session" and
/// "which path is requested". The HTTP layer turns the decision into a
/// redirect; this module only decides.
///
/// | session | path                          | decision                         |
/// |---------|-------------------------------|----------------------------------|
/// | none    | under `/dashboard`            | login, with the path as callback |
/// | any     | `/login` or `/register`       | dashboard home                   |
/// | non-admin | under `/dashboard/admin`    | dashboard home                   |
/// | student | under `/dashboard/teacher`    | dashboard home                   |
/// | other   | anything else                 | pass through                     |
///
/// # Example
///
/// ```
/// use lingua_shared::auth::guard::{decide, GuardDecision};
/// use lingua_shared::models::user::UserRole;
///
/// assert_eq!(
///     decide(None, "/dashboard/messages", None),
///     GuardDecision::RedirectToLogin { callback_url: "/dashboard/messages".to_string() }
/// );
/// assert_eq!(decide(Some(UserRole::Student), "/login", None), GuardDecision::RedirectToDashboard);
/// assert_eq!(decide(None, "/courses", None), GuardDecision::PassThrough);
/// ```

use crate::models::user::UserRole;

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const ADMIN_PREFIX: &str = "/dashboard/admin";
pub const TEACHER_PREFIX: &str = "/dashboard/teacher";

/// Paths that require a session
pub const PROTECTED_PREFIXES: &[&str] = &[DASHBOARD_PATH];

/// Paths a signed-in user is sent away from
pub const GUEST_ONLY_PATHS: &[&str] = &[LOGIN_PATH, REGISTER_PATH];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    PassThrough,
    /// `callback_url` is the original path and query, not yet encoded
    RedirectToLogin { callback_url: String },
    RedirectToDashboard,
}

impl GuardDecision {
    /// Redirect target, or `None` to let the request through
    pub fn location(&self) -> Option<String> {
        match self {
            GuardDecision::PassThrough => None,
            GuardDecision::RedirectToLogin { callback_url } => Some(format!(
                "{LOGIN_PATH}?callbackUrl={}",
                urlencoding::encode(callback_url)
            )),
            GuardDecision::RedirectToDashboard => Some(DASHBOARD_PATH.to_string()),
        }
    }
}

/// `path` equals `prefix` or is nested below it
fn is_under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

pub fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|prefix| is_under(path, prefix))
}

pub fn is_guest_only(path: &str) -> bool {
    GUEST_ONLY_PATHS
        .iter()
        .any(|p| path == *p || path.strip_suffix('/') == Some(*p))
}

/// Decides what to do with a page request
///
/// # Arguments
///
/// * `session_role` - role from a verified session token, `None` without one
/// * `path` - request path
/// * `query` - raw query string, kept in the login callback
pub fn decide(session_role: Option<UserRole>, path: &str, query: Option<&str>) -> GuardDecision {
    match session_role {
        None if is_protected(path) => {
            let callback_url = match query.filter(|q| !q.is_empty()) {
                Some(q) => format!("{path}?{q}"),
                None => path.to_string(),
            };
            GuardDecision::RedirectToLogin { callback_url }
        }
        None => GuardDecision::PassThrough,
        Some(_) if is_guest_only(path) => GuardDecision::RedirectToDashboard,
        Some(role) if is_under(path, ADMIN_PREFIX) && !role.is_admin() => {
            GuardDecision::RedirectToDashboard
        }
        Some(role) if is_under(path, TEACHER_PREFIX) && !role.can_teach() => {
            GuardDecision::RedirectToDashboard
        }
        Some(_) => GuardDecision::PassThrough,
    }
}

/// Only same-site relative paths are accepted as post-login targets
pub fn safe_callback(callback: Option<&str>) -> &str {
    match callback {
        Some(url) if url.starts_with('/') && !url.starts_with("//") && !url.contains('\\') => url,
        _ => DASHBOARD_PATH,
    }
}
