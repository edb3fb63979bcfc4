/// Role-specific profile rows
///
/// A STUDENT user owns at most one [`Student`] row and a TEACHER user at most
/// one [`Teacher`] row (`user_id` is unique on both tables). Student rows are
/// created lazily the first time a student signs in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    pub id: Uuid,
    pub user_id: Uuid,
    pub phone: Option<String>,
    /// Self-assessed level, e.g. "A2"
    pub level: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateStudent {
    pub user_id: Uuid,
    pub phone: Option<String>,
    pub level: Option<String>,
}

impl CreateStudent {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Teacher {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bio: Option<String>,
    pub languages: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateTeacher {
    pub user_id: Uuid,
    pub bio: Option<String>,
    pub languages: Vec<String>,
}

impl Student {
    /// Inserts the profile, or returns the existing one for this user
    pub async fn create(pool: &PgPool, data: CreateStudent) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (user_id, phone, level)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id, phone, level, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.phone)
        .bind(data.level)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Student>(
            "SELECT id, user_id, phone, level, created_at FROM students WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }
}

impl Teacher {
    pub async fn create(pool: &PgPool, data: CreateTeacher) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Teacher>(
            r#"
            INSERT INTO teachers (user_id, bio, languages)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET bio = EXCLUDED.bio, languages = EXCLUDED.languages
            RETURNING id, user_id, bio, languages, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.bio)
        .bind(data.languages)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Teacher>(
            "SELECT id, user_id, bio, languages, created_at FROM teachers WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }
}
