/// Course catalog: courses and their scheduled sessions
///
/// A [`Schedule`] is one run of a course with a fixed capacity. Its
/// `current_students` counter only moves when a payment for an enrollment is
/// confirmed (see [`crate::payments`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const SCHEDULE_COLUMNS: &str =
    "id, course_id, teacher_id, starts_at, ends_at, max_students, current_students, location";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Course {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    /// Language taught, e.g. "Spanish"
    pub language: String,
    pub level: String,
    pub description: String,
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateCourse {
    pub slug: String,
    pub title: String,
    pub language: String,
    pub level: String,
    pub description: String,
    pub price_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Schedule {
    pub id: Uuid,
    pub course_id: Uuid,
    pub teacher_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_students: i32,
    /// Number of paid enrollments
    pub current_students: i32,
    pub location: Option<String>,
}

impl Schedule {
    pub fn is_full(&self) -> bool {
        self.current_students >= self.max_students
    }

    pub fn seats_left(&self) -> i32 {
        (self.max_students - self.current_students).max(0)
    }
}

#[derive(Debug, Clone)]
pub struct CreateSchedule {
    pub course_id: Uuid,
    pub teacher_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub max_students: i32,
    pub location: Option<String>,
}

impl Course {
    pub async fn create(pool: &PgPool, data: CreateCourse) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Course>(
            r#"
            INSERT INTO courses (slug, title, language, level, description, price_cents)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, slug, title, language, level, description, price_cents, created_at
            "#,
        )
        .bind(data.slug)
        .bind(data.title)
        .bind(data.language)
        .bind(data.level)
        .bind(data.description)
        .bind(data.price_cents)
        .fetch_one(pool)
        .await
    }

    /// All courses ordered by language, then title
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Course>(
            "SELECT id, slug, title, language, level, description, price_cents, created_at
             FROM courses ORDER BY language, title",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Course>(
            "SELECT id, slug, title, language, level, description, price_cents, created_at
             FROM courses WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(pool)
        .await
    }
}

impl Schedule {
    pub async fn create(pool: &PgPool, data: CreateSchedule) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO schedules (course_id, teacher_id, starts_at, ends_at, max_students, location)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {SCHEDULE_COLUMNS}"
        );

        sqlx::query_as::<_, Schedule>(&sql)
            .bind(data.course_id)
            .bind(data.teacher_id)
            .bind(data.starts_at)
            .bind(data.ends_at)
            .bind(data.max_students)
            .bind(data.location)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = $1");
        sqlx::query_as::<_, Schedule>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Sessions of a course, soonest first
    pub async fn list_for_course(pool: &PgPool, course_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE course_id = $1 ORDER BY starts_at, id"
        );
        sqlx::query_as::<_, Schedule>(&sql)
            .bind(course_id)
            .fetch_all(pool)
            .await
    }

    pub async fn list_for_teacher(pool: &PgPool, teacher_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE teacher_id = $1 ORDER BY starts_at, id"
        );
        sqlx::query_as::<_, Schedule>(&sql)
            .bind(teacher_id)
            .fetch_all(pool)
            .await
    }

    /// Adds one paid student and returns the new count
    pub async fn increment_students(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
    ) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE schedules SET current_students = current_students + 1
             WHERE id = $1
             RETURNING current_students",
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }
}
