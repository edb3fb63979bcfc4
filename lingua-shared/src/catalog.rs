/// Course catalog, enrollment and blog operations
///
/// Read operations are public. Enrolling needs a student session; creating
/// catalog entries is left to admin handlers, which check the role first.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::session::{require_role, require_session, SessionContext};
use crate::error::{ServiceError, ServiceResult};
use crate::models::blog_post::BlogPost;
use crate::models::course::{Course, CreateSchedule, Schedule};
use crate::models::enrollment::{Enrollment, EnrollmentView};
use crate::models::user::UserRole;
use crate::store::{Store, StoreError};

/// A course with all of its schedules
#[derive(Debug, Clone, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub schedules: Vec<Schedule>,
}

pub async fn course_detail<S: Store + ?Sized>(store: &S, slug: &str) -> ServiceResult<CourseDetail> {
    let course = store
        .find_course_by_slug(slug)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Course".to_string()))?;
    let schedules = store.list_schedules_for_course(course.id).await?;
    Ok(CourseDetail { course, schedules })
}

pub async fn published_post<S: Store + ?Sized>(store: &S, slug: &str) -> ServiceResult<BlogPost> {
    store
        .find_published_post(slug)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Post".to_string()))
}

/// Reserves a pending seat on `schedule_id` for the calling student
///
/// # Errors
///
/// - `AuthorizationDenied` for non-students
/// - `NotFound` for an unknown schedule
/// - `Conflict` when the schedule is full or the student is already enrolled
pub async fn enroll<S: Store + ?Sized>(
    store: &S,
    session: Option<&SessionContext>,
    schedule_id: Uuid,
) -> ServiceResult<Enrollment> {
    let session = require_session(session)?;
    require_role(session, &[UserRole::Student])?;

    let student = store
        .find_student_by_user(session.user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Student profile".to_string()))?;

    let schedule = store
        .find_schedule(schedule_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Schedule".to_string()))?;
    if schedule.is_full() {
        return Err(ServiceError::Conflict("Schedule is full".to_string()));
    }

    let enrollment = match store.create_enrollment(student.id, schedule.id).await {
        Ok(Some(enrollment)) => enrollment,
        // Filled up between the read above and the insert.
        Ok(None) => return Err(ServiceError::Conflict("Schedule is full".to_string())),
        Err(StoreError::Conflict(_)) => {
            return Err(ServiceError::Conflict(
                "Already enrolled in this schedule".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    };

    info!(enrollment_id = %enrollment.id, %schedule_id, student_id = %student.id, "Enrollment created");
    Ok(enrollment)
}

/// Enrollments of the calling student, empty for users without a student profile
pub async fn my_enrollments<S: Store + ?Sized>(
    store: &S,
    session: &SessionContext,
) -> ServiceResult<Vec<EnrollmentView>> {
    match store.find_student_by_user(session.user_id).await? {
        Some(student) => Ok(store.list_enrollments_for_student(student.id).await?),
        None => Ok(Vec::new()),
    }
}

/// Admin input for a new schedule; the teacher is named by user id
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub course_id: Uuid,
    pub teacher_user_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_students: i32,
    pub location: Option<String>,
}

/// Adds a run of an existing course
///
/// # Errors
///
/// - `ValidationFailed` when the time range or capacity is unusable
/// - `NotFound` when the course is unknown or the user has no teacher profile
pub async fn create_schedule<S: Store + ?Sized>(store: &S, input: NewSchedule) -> ServiceResult<Schedule> {
    if input.ends_at <= input.starts_at {
        return Err(ServiceError::invalid("ends_at", "End must be after start"));
    }
    if input.max_students < 1 {
        return Err(ServiceError::invalid("max_students", "Capacity must be at least 1"));
    }

    let teacher_id = match input.teacher_user_id {
        Some(user_id) => Some(
            store
                .find_teacher_by_user(user_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Teacher".to_string()))?
                .id,
        ),
        None => None,
    };

    let schedule = store
        .create_schedule(CreateSchedule {
            course_id: input.course_id,
            teacher_id,
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            max_students: input.max_students,
            location: input.location,
        })
        .await?;
    info!(schedule_id = %schedule.id, course_id = %schedule.course_id, "Schedule created");
    Ok(schedule)
}

/// Schedules taught by the calling user, empty without a teacher profile
pub async fn my_schedules<S: Store + ?Sized>(
    store: &S,
    session: &SessionContext,
) -> ServiceResult<Vec<Schedule>> {
    match store.find_teacher_by_user(session.user_id).await? {
        Some(teacher) => Ok(store.list_schedules_for_teacher(teacher.id).await?),
        None => Ok(Vec::new()),
    }
}
