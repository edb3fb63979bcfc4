/// Course catalog, blog and enrollment endpoints
///
/// # Endpoints
///
/// - `GET  /api/courses` - All courses
/// - `GET  /api/courses/:slug` - A course with its schedules
/// - `GET  /api/posts` - Published blog posts, newest first
/// - `GET  /api/posts/:slug` - One published post
/// - `POST /api/enrollments` - Reserve a seat (students only)
/// - `GET  /api/enrollments` - The caller's enrollments

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{ApiJson, ApiPath},
    middleware::session::{AuthSession, Session},
    routes::{success, Success},
};
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use lingua_shared::{
    catalog::{self, CourseDetail},
    models::{
        blog_post::BlogPost,
        course::Course,
        enrollment::{Enrollment, EnrollmentView},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct CoursesResponse {
    pub courses: Vec<Course>,
}

#[derive(Debug, Serialize)]
pub struct CourseResponse {
    pub course: CourseDetail,
}

#[derive(Debug, Serialize)]
pub struct PostsResponse {
    pub posts: Vec<BlogPost>,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub post: BlogPost,
}

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub schedule_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentResponse {
    pub enrollment: Enrollment,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentsResponse {
    pub enrollments: Vec<EnrollmentView>,
}

pub async fn list_courses(State(state): State<AppState>) -> ApiResult<Json<Success<CoursesResponse>>> {
    let courses = state.store.list_courses().await?;
    Ok(success(CoursesResponse { courses }))
}

/// # Errors
///
/// - `404 Not Found`: Unknown slug
pub async fn get_course(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> ApiResult<Json<Success<CourseResponse>>> {
    let course = catalog::course_detail(&*state.store, &slug).await?;
    Ok(success(CourseResponse { course }))
}

pub async fn list_posts(State(state): State<AppState>) -> ApiResult<Json<Success<PostsResponse>>> {
    let posts = state.store.list_published_posts().await?;
    Ok(success(PostsResponse { posts }))
}

/// # Errors
///
/// - `404 Not Found`: Unknown slug or unpublished post
pub async fn get_post(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> ApiResult<Json<Success<PostResponse>>> {
    let post = catalog::published_post(&*state.store, &slug).await?;
    Ok(success(PostResponse { post }))
}

/// Reserves a pending seat; payment confirmation arrives through the webhook
///
/// # Errors
///
/// - `401 Unauthorized`: No session
/// - `403 Forbidden`: Caller is not a student
/// - `404 Not Found`: Unknown schedule
/// - `409 Conflict`: Schedule full or already enrolled
pub async fn enroll(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<EnrollRequest>,
) -> ApiResult<(StatusCode, Json<Success<EnrollmentResponse>>)> {
    let enrollment = catalog::enroll(&*state.store, session.get(), req.schedule_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(Success::new(EnrollmentResponse { enrollment }).with_message("Seat reserved, awaiting payment")),
    ))
}

pub async fn my_enrollments(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> ApiResult<Json<Success<EnrollmentsResponse>>> {
    let enrollments = catalog::my_enrollments(&*state.store, &session).await?;
    Ok(success(EnrollmentsResponse { enrollments }))
}
