/// Back-office creation endpoints (ADMIN only)
///
/// - `POST /api/admin/users` - Seed an account of any role
/// - `POST /api/admin/courses` - Add a course
/// - `POST /api/admin/schedules` - Add a run of a course
/// - `POST /api/admin/posts` - Write a blog post

use crate::{
    app::AppState,
    error::ApiResult,
    extract::ApiJson,
    middleware::session::AuthSession,
    routes::Success,
};
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use lingua_shared::{
    auth::{
        identity::{seed_user, SeedUser},
        session::{require_role, SessionContext},
    },
    catalog::{self, NewSchedule},
    error::ServiceError,
    models::{
        blog_post::{BlogPost, CreateBlogPost},
        course::{Course, CreateCourse, Schedule},
        user::{UserRole, UserSummary},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

type Created<T> = ApiResult<(StatusCode, Json<Success<T>>)>;

fn created<T: Serialize>(data: T, message: &str) -> Created<T> {
    Ok((StatusCode::CREATED, Json(Success::new(data).with_message(message))))
}

fn require_admin(session: &SessionContext) -> Result<(), ServiceError> {
    require_role(session, &[UserRole::Admin])
}

/// Lowercase letters, digits and single hyphens
fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let well_formed = !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if well_formed {
        Ok(())
    } else {
        let mut error = ValidationError::new("slug");
        error.message = Some("Slug may only contain lowercase letters, digits and hyphens".into());
        Err(error)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,

    pub role: UserRole,

    /// Omit for accounts that sign in through Google only
    pub password: Option<String>,

    #[validate(length(max = 2000, message = "Bio is too long"))]
    pub bio: Option<String>,

    #[serde(default)]
    pub languages: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(custom(function = "validate_slug"), length(max = 100, message = "Slug is too long"))]
    pub slug: String,

    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 50, message = "Language is required"))]
    pub language: String,

    #[validate(length(min = 1, max = 50, message = "Level is required"))]
    pub level: String,

    #[serde(default)]
    pub description: String,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price_cents: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateScheduleRequest {
    pub course_id: Uuid,

    /// User id of the teacher
    pub teacher_id: Option<Uuid>,

    pub starts_at: DateTime<Utc>,

    pub ends_at: DateTime<Utc>,

    #[validate(range(min = 1, max = 500, message = "Capacity must be between 1 and 500"))]
    pub max_students: i32,

    #[validate(length(max = 200, message = "Location is too long"))]
    pub location: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(custom(function = "validate_slug"), length(max = 150, message = "Slug is too long"))]
    pub slug: String,

    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(length(max = 500, message = "Excerpt is too long"))]
    #[serde(default)]
    pub excerpt: String,

    #[validate(length(min = 1, message = "Body is required"))]
    pub body: String,

    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: UserSummary,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct CourseResponse {
    pub course: Course,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub schedule: Schedule,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub post: BlogPost,
}

/// Creates an account with any role and its profile row
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed or weak password
/// - `403 Forbidden`: Caller is not an admin
/// - `409 Conflict`: Email already exists
pub async fn create_user(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Created<UserResponse> {
    require_admin(&session)?;
    req.validate()?;

    let user = seed_user(
        &*state.store,
        SeedUser {
            email: req.email,
            name: req.name,
            role: req.role,
            password: req.password,
            bio: req.bio,
            languages: req.languages,
        },
        &state.hash_params(),
    )
    .await?;

    created(
        UserResponse {
            user: user.summary(),
            email: user.email,
        },
        "User created",
    )
}

/// # Errors
///
/// - `409 Conflict`: Slug already used
pub async fn create_course(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    ApiJson(req): ApiJson<CreateCourseRequest>,
) -> Created<CourseResponse> {
    require_admin(&session)?;
    req.validate()?;

    let course = state
        .store
        .create_course(CreateCourse {
            slug: req.slug,
            title: req.title,
            language: req.language,
            level: req.level,
            description: req.description,
            price_cents: req.price_cents,
        })
        .await?;
    tracing::info!(course_id = %course.id, slug = %course.slug, "Course created");

    created(CourseResponse { course }, "Course created")
}

/// # Errors
///
/// - `400 Bad Request`: End before start or bad capacity
/// - `404 Not Found`: Unknown course, or the teacher has no teacher profile
pub async fn create_schedule(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    ApiJson(req): ApiJson<CreateScheduleRequest>,
) -> Created<ScheduleResponse> {
    require_admin(&session)?;
    req.validate()?;

    let schedule = catalog::create_schedule(
        &*state.store,
        NewSchedule {
            course_id: req.course_id,
            teacher_user_id: req.teacher_id,
            starts_at: req.starts_at,
            ends_at: req.ends_at,
            max_students: req.max_students,
            location: req.location,
        },
    )
    .await?;

    created(ScheduleResponse { schedule }, "Schedule created")
}

/// The calling admin is recorded as the author
///
/// # Errors
///
/// - `409 Conflict`: Slug already used
pub async fn create_post(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> Created<PostResponse> {
    require_admin(&session)?;
    req.validate()?;

    let post = state
        .store
        .create_post(CreateBlogPost {
            slug: req.slug,
            title: req.title,
            excerpt: req.excerpt,
            body: req.body,
            author_id: session.user_id,
            published: req.published,
        })
        .await?;
    tracing::info!(post_id = %post.id, slug = %post.slug, published = post.published, "Blog post created");

    created(PostResponse { post }, "Post created")
}
