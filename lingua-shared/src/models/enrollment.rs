/// Enrollment model and database operations
///
/// An enrollment starts `PENDING` when a student reserves a seat and becomes
/// `PAID` once the payment provider confirms checkout.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE payment_status AS ENUM ('PENDING', 'PAID', 'CANCELLED');
///
/// CREATE TABLE enrollments (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     student_id UUID NOT NULL REFERENCES students(id),
///     schedule_id UUID NOT NULL REFERENCES schedules(id),
///     payment_status payment_status NOT NULL DEFAULT 'PENDING',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     paid_at TIMESTAMPTZ,
///     UNIQUE (student_id, schedule_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

const ENROLLMENT_COLUMNS: &str = "id, student_id, schedule_id, payment_status, created_at, paid_at";

const VIEW_SELECT: &str = r#"
    SELECT e.id, e.schedule_id, e.payment_status, e.created_at, e.paid_at,
           u.email AS student_email, u.name AS student_name,
           c.title AS course_title, s.starts_at
    FROM enrollments e
    JOIN students st ON st.id = e.student_id
    JOIN users u ON u.id = st.user_id
    JOIN schedules s ON s.id = e.schedule_id
    JOIN courses c ON c.id = s.course_id
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "CANCELLED" => Ok(PaymentStatus::Cancelled),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub schedule_id: Uuid,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Enrollment joined with the student and course it refers to, for tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EnrollmentView {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub student_email: String,
    pub student_name: Option<String>,
    pub course_title: String,
    pub starts_at: DateTime<Utc>,
}

impl Enrollment {
    /// Reserves a seat when the schedule still has capacity
    ///
    /// # Returns
    ///
    /// `None` when the schedule is full or does not exist
    ///
    /// # Errors
    ///
    /// Returns a unique-violation error when the student is already enrolled.
    pub async fn create(
        pool: &PgPool,
        student_id: Uuid,
        schedule_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "INSERT INTO enrollments (student_id, schedule_id)
             SELECT $1, s.id FROM schedules s
             WHERE s.id = $2 AND s.current_students < s.max_students
             RETURNING {ENROLLMENT_COLUMNS}"
        );

        sqlx::query_as::<_, Enrollment>(&sql)
            .bind(student_id)
            .bind(schedule_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = $1");
        sqlx::query_as::<_, Enrollment>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Flips a pending enrollment to paid inside an open transaction
    ///
    /// # Returns
    ///
    /// The enrollment's schedule id if the row was pending, `None` otherwise
    pub async fn mark_paid(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE enrollments
             SET payment_status = 'PAID', paid_at = NOW()
             WHERE id = $1 AND payment_status = 'PENDING'
             RETURNING schedule_id",
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn status_of(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
    ) -> Result<Option<PaymentStatus>, sqlx::Error> {
        sqlx::query_scalar("SELECT payment_status FROM enrollments WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn list_for_student(
        pool: &PgPool,
        student_id: Uuid,
    ) -> Result<Vec<EnrollmentView>, sqlx::Error> {
        let sql = format!("{VIEW_SELECT} WHERE e.student_id = $1 ORDER BY s.starts_at, e.id");
        sqlx::query_as::<_, EnrollmentView>(&sql)
            .bind(student_id)
            .fetch_all(pool)
            .await
    }

    /// Admin listing, newest first, optionally restricted to one status
    pub async fn search(
        pool: &PgPool,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<EnrollmentView>, sqlx::Error> {
        let sql = format!(
            "{VIEW_SELECT} WHERE ($1::payment_status IS NULL OR e.payment_status = $1)
             ORDER BY e.created_at DESC, e.id DESC"
        );
        sqlx::query_as::<_, EnrollmentView>(&sql)
            .bind(status)
            .fetch_all(pool)
            .await
    }
}
