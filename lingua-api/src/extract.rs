/// Request extractors with JSON error bodies
///
/// Thin wrappers over axum's `Json`, `Query` and `Path` whose rejections
/// become [`ApiError`], so a malformed body, query string or path segment
/// gets the usual `{"status": "error", ...}` envelope with `400 Bad Request`.
///
/// # Example
///
/// ```no_run
/// use lingua_api::extract::ApiJson;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Ping {
///     message: String,
/// }
///
/// async fn ping(ApiJson(ping): ApiJson<Ping>) -> String {
///     ping.message
/// }
/// ```

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

/// JSON request body
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Path parameters
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::{Request, StatusCode}, routing::{get, post}, Router};
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize)]
    struct Signup {
        email: String,
    }

    fn app() -> Router {
        Router::new()
            .route("/signup", post(|ApiJson(req): ApiJson<Signup>| async move { req.email }))
            .route("/items/:id", get(|ApiPath(id): ApiPath<uuid::Uuid>| async move { id.to_string() }))
    }

    async fn error_body(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_field_is_400_envelope() {
        let request = Request::builder()
            .method("POST")
            .uri("/signup")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"mail":"x@example.com"}"#))
            .unwrap();

        let (status, body) = error_body(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_bad_path_segment_is_400_envelope() {
        let request = Request::builder().uri("/items/42").body(Body::empty()).unwrap();

        let (status, body) = error_body(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }
}
