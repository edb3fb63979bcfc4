/// User model and database operations
///
/// A user is created the first time someone signs in through an external
/// provider, when a visitor registers with a password, or when an admin seeds
/// an account. The role chosen at creation never changes afterwards.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('STUDENT', 'TEACHER', 'ADMIN');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email TEXT NOT NULL,              -- unique on LOWER(email)
///     name TEXT,
///     image TEXT,
///     password_hash TEXT,               -- NULL for provider-only accounts
///     role user_role NOT NULL DEFAULT 'STUDENT',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use lingua_shared::models::user::{CreateUser, User, UserRole};
/// use lingua_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::with_url("postgresql://localhost/lingua")).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "ana@example.com".to_string(),
///     name: Some("Ana".to_string()),
///     image: None,
///     password_hash: None,
///     role: UserRole::Student,
/// }).await?;
///
/// let found = User::find_by_email(&pool, "ANA@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, name, image, password_hash, role, created_at, updated_at";

/// Account role
///
/// Stored as the `user_role` Postgres enum and carried inside session tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Student,
    Teacher,
    Admin,
}

impl UserRole {
    /// Returns the role as it is spelled in the database and in tokens
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "STUDENT",
            UserRole::Teacher => "TEACHER",
            UserRole::Admin => "ADMIN",
        }
    }

    /// Whether this role may open the teacher area of the dashboard
    pub fn can_teach(&self) -> bool {
        matches!(self, UserRole::Teacher | UserRole::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STUDENT" => Ok(UserRole::Student),
            "TEACHER" => Ok(UserRole::Teacher),
            "ADMIN" => Ok(UserRole::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// User account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Unique, compared case-insensitively
    pub email: String,

    pub name: Option<String>,

    /// Avatar URL, copied from the identity provider or set by the user
    pub image: Option<String>,

    /// Argon2id PHC string; `None` for accounts that only sign in through a provider
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,

    pub role: UserRole,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Display label used in listings: the name when set, otherwise the email
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }

    /// Public projection shown to other users
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            image: self.image.clone(),
            role: self.role,
        }
    }
}

/// The fields of a user other participants are allowed to see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub image: Option<String>,
    pub role: UserRole,
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    /// Already hashed; never a plaintext password
    pub password_hash: Option<String>,
    pub role: UserRole,
}

/// Profile fields a user may change through a session refresh
///
/// `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub image: Option<String>,
}

impl UpdateProfile {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.image.is_none()
    }
}

/// Admin listing filter
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub role: UserRole,
    /// Case-insensitive substring matched against name and email
    pub query: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl UserFilter {
    pub fn role(role: UserRole) -> Self {
        Self {
            role,
            query: None,
            limit: 50,
            offset: 0,
        }
    }

    /// Whether `user` satisfies the filter; mirrors the SQL predicate
    pub fn matches(&self, user: &User) -> bool {
        if user.role != self.role {
            return false;
        }
        match self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            None => true,
            Some(query) => {
                let needle = query.to_lowercase();
                user.email.to_lowercase().contains(&needle)
                    || user
                        .name
                        .as_deref()
                        .is_some_and(|name| name.to_lowercase().contains(&needle))
            }
        }
    }
}

/// Escapes `%`, `_` and `\` so user input is matched literally by `ILIKE`
pub fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl User {
    /// Inserts a new user
    ///
    /// # Errors
    ///
    /// Returns a unique-violation database error when the email is taken.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO users (email, name, image, password_hash, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(data.email.trim())
            .bind(data.name)
            .bind(data.image)
            .bind(data.password_hash)
            .bind(data.role)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Looks a user up by email, ignoring case
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");
        sqlx::query_as::<_, User>(&sql)
            .bind(email.trim())
            .fetch_optional(pool)
            .await
    }

    /// Applies the non-`None` fields of `data`
    ///
    /// # Returns
    ///
    /// The updated user, or `None` if no user has this id
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE users
             SET name = COALESCE($2, name),
                 image = COALESCE($3, image),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(data.name)
            .bind(data.image)
            .fetch_optional(pool)
            .await
    }

    /// Replaces the password hash inside an open transaction
    pub async fn set_password_hash(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts how many of `ids` reference existing users
    pub async fn count_existing(pool: &PgPool, ids: &[Uuid]) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_one(pool)
            .await
    }

    /// Admin listing with optional search, newest first
    pub async fn search(pool: &PgPool, filter: &UserFilter) -> Result<Vec<Self>, sqlx::Error> {
        let pattern = filter
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(like_pattern);

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE role = $1
               AND ($2::TEXT IS NULL OR email ILIKE $2 OR name ILIKE $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(filter.role)
            .bind(pattern)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count_by_role(pool: &PgPool, role: UserRole) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role)
            .fetch_one(pool)
            .await
    }
}
