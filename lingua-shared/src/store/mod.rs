/// Persistence gateway
///
/// Services talk to storage only through these traits. Two implementations
/// exist:
///
/// - [`postgres::PgStore`]: the production backend over a `sqlx` pool
/// - [`memory::MemoryStore`]: a process-local backend for tests and demos
///
/// Operations that must be atomic (opening a conversation, appending a
/// message, consuming a reset token, applying a payment event) are single
/// trait methods so each backend can make them atomic its own way.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    blog_post::{BlogPost, CreateBlogPost},
    conversation::{ConversationSummary, ConversationThread, Message, OpenedConversation},
    course::{Course, CreateCourse, CreateSchedule, Schedule},
    enrollment::{Enrollment, EnrollmentView, PaymentStatus},
    password_reset::PasswordResetToken,
    profile::{CreateStudent, CreateTeacher, Student, Teacher},
    user::{CreateUser, UpdateProfile, User, UserFilter, UserRole},
};

pub mod memory;
pub mod postgres;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// What applying a `checkout.session.completed` event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Enrollment marked paid and the schedule counter incremented
    Applied { schedule_id: Uuid, current_students: i32 },
    /// The event id was recorded before; nothing changed
    AlreadyProcessed,
    /// The enrollment was not pending; the event is recorded, nothing else changed
    NotPending(PaymentStatus),
    /// No such enrollment; nothing is recorded
    EnrollmentNotFound,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// # Errors
    ///
    /// [`StoreError::Conflict`] when the email is already registered.
    async fn create_user(&self, data: CreateUser) -> StoreResult<User>;

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Case-insensitive lookup
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn update_user_profile(&self, id: Uuid, data: UpdateProfile) -> StoreResult<Option<User>>;

    /// How many of `ids` exist
    async fn count_existing_users(&self, ids: &[Uuid]) -> StoreResult<usize>;

    async fn search_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>>;

    async fn count_users_by_role(&self, role: UserRole) -> StoreResult<i64>;

    /// Creates the profile, or returns the existing one for this user
    async fn create_student(&self, data: CreateStudent) -> StoreResult<Student>;

    async fn find_student_by_user(&self, user_id: Uuid) -> StoreResult<Option<Student>>;

    async fn create_teacher(&self, data: CreateTeacher) -> StoreResult<Teacher>;

    async fn find_teacher_by_user(&self, user_id: Uuid) -> StoreResult<Option<Teacher>>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Reuses the conversation whose participant set equals `participant_ids`
    /// or creates it, then appends the sender's message. Atomic.
    ///
    /// `participant_ids` must be sorted, deduplicated and contain `sender_id`.
    async fn open_conversation(
        &self,
        participant_ids: &[Uuid],
        sender_id: Uuid,
        content: &str,
    ) -> StoreResult<OpenedConversation>;

    /// Appends a message and bumps the conversation's recency in one step
    ///
    /// # Returns
    ///
    /// `None` when the sender is not a participant (or the conversation does
    /// not exist); nothing is written in that case
    async fn append_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> StoreResult<Option<Message>>;

    /// Conversations of `user_id`, most recently updated first
    async fn list_conversations(&self, user_id: Uuid) -> StoreResult<Vec<ConversationSummary>>;

    /// The full thread, only if `user_id` participates in it
    async fn find_conversation_for_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<ConversationThread>>;
}

#[async_trait]
pub trait PasswordResetStore: Send + Sync {
    /// Deletes the user's previous tokens and stores a new digest. Atomic.
    async fn replace_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<PasswordResetToken>;

    async fn find_reset_token(&self, token_hash: &str) -> StoreResult<Option<PasswordResetToken>>;

    /// Deletes the token and, when it was still valid at `now`, sets the new
    /// password hash. Atomic.
    ///
    /// # Returns
    ///
    /// The user whose password changed, or `None` for unknown or expired tokens
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Uuid>>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_course(&self, data: CreateCourse) -> StoreResult<Course>;

    async fn list_courses(&self) -> StoreResult<Vec<Course>>;

    async fn find_course_by_slug(&self, slug: &str) -> StoreResult<Option<Course>>;

    async fn create_schedule(&self, data: CreateSchedule) -> StoreResult<Schedule>;

    async fn find_schedule(&self, id: Uuid) -> StoreResult<Option<Schedule>>;

    async fn list_schedules_for_course(&self, course_id: Uuid) -> StoreResult<Vec<Schedule>>;

    async fn list_schedules_for_teacher(&self, teacher_id: Uuid) -> StoreResult<Vec<Schedule>>;

    /// Reserves a pending seat
    ///
    /// # Returns
    ///
    /// `None` when the schedule is full or missing
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] when the student already holds a seat.
    async fn create_enrollment(&self, student_id: Uuid, schedule_id: Uuid) -> StoreResult<Option<Enrollment>>;

    async fn find_enrollment(&self, id: Uuid) -> StoreResult<Option<Enrollment>>;

    async fn list_enrollments_for_student(&self, student_id: Uuid) -> StoreResult<Vec<EnrollmentView>>;

    async fn search_enrollments(&self, status: Option<PaymentStatus>) -> StoreResult<Vec<EnrollmentView>>;

    async fn create_post(&self, data: CreateBlogPost) -> StoreResult<BlogPost>;

    async fn list_published_posts(&self) -> StoreResult<Vec<BlogPost>>;

    async fn find_published_post(&self, slug: &str) -> StoreResult<Option<BlogPost>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Applies a completed checkout exactly once per `event_id`
    ///
    /// Recording the event, marking the enrollment paid and incrementing the
    /// schedule counter happen in one transaction.
    async fn apply_checkout_completed(
        &self,
        event_id: &str,
        event_type: &str,
        enrollment_id: Uuid,
    ) -> StoreResult<CheckoutOutcome>;
}

/// Everything the API needs from storage
#[async_trait]
pub trait Store:
    UserStore + ConversationStore + PasswordResetStore + CatalogStore + PaymentStore
{
    /// Short backend name for logs and the health endpoint
    fn backend(&self) -> &'static str;

    /// Cheap connectivity check
    async fn ping(&self) -> StoreResult<()>;
}
