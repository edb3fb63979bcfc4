/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: registration, login, logout, session refresh and Google sign-in
/// - `password_reset`: reset request, token check and confirmation
/// - `forms`: contact and newsletter relay
/// - `webhooks`: signed payment events
/// - `catalog`: courses, blog posts and enrollment
/// - `conversations`: messaging between users
/// - `admin`: back-office creation of users and catalog entries
/// - `pages`: login and register page descriptors
/// - `dashboard`: guarded dashboard views
///
/// Successful responses share the error envelope's `status` field:
///
/// ```json
/// { "status": "success", "message": "...", ...data }
/// ```

use axum::Json;
use serde::Serialize;

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod conversations;
pub mod dashboard;
pub mod forms;
pub mod health;
pub mod pages;
pub mod password_reset;
pub mod webhooks;

/// Success envelope; `data` fields are flattened next to `status`
#[derive(Debug, Serialize)]
pub struct Success<T: Serialize> {
    pub status: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(flatten)]
    pub data: T,
}

/// Payload-free success body
#[derive(Debug, Serialize)]
pub struct NoData {}

impl<T: Serialize> Success<T> {
    pub fn new(data: T) -> Self {
        Self {
            status: "success",
            message: None,
            data,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

pub fn success<T: Serialize>(data: T) -> Json<Success<T>> {
    Json(Success::new(data))
}

/// `{ "status": "success", "message": message }`
pub fn done(message: impl Into<String>) -> Json<Success<NoData>> {
    Json(Success::new(NoData {}).with_message(message))
}
