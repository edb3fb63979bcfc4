/// PostgreSQL implementation of the store traits
///
/// Single-statement operations delegate to the model functions; multi-step
/// operations open a transaction and commit only when every step succeeded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    CatalogStore, CheckoutOutcome, ConversationStore, PasswordResetStore, PaymentStore, Store,
    StoreError, StoreResult, UserStore,
};
use crate::db::pool::health_check;
use crate::models::{
    blog_post::{BlogPost, CreateBlogPost},
    conversation::{
        Conversation, ConversationSummary, ConversationThread, Message, OpenedConversation,
    },
    course::{Course, CreateCourse, CreateSchedule, Schedule},
    enrollment::{Enrollment, EnrollmentView, PaymentStatus},
    password_reset::PasswordResetToken,
    processed_event::ProcessedEvent,
    profile::{CreateStudent, CreateTeacher, Student, Teacher},
    user::{CreateUser, UpdateProfile, User, UserFilter, UserRole, UserSummary},
};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Turns unique-constraint violations into [`StoreError::Conflict`]
fn conflict_on_unique(err: sqlx::Error, message: &str) -> StoreError {
    let is_unique = matches!(
        &err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION)
    );
    if is_unique {
        StoreError::Conflict(message.to_string())
    } else {
        StoreError::Database(err)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        User::create(&self.pool, data)
            .await
            .map_err(|e| conflict_on_unique(e, "Email already registered"))
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn update_user_profile(&self, id: Uuid, data: UpdateProfile) -> StoreResult<Option<User>> {
        Ok(User::update_profile(&self.pool, id, data).await?)
    }

    async fn count_existing_users(&self, ids: &[Uuid]) -> StoreResult<usize> {
        let count = User::count_existing(&self.pool, ids).await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn search_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        Ok(User::search(&self.pool, filter).await?)
    }

    async fn count_users_by_role(&self, role: UserRole) -> StoreResult<i64> {
        Ok(User::count_by_role(&self.pool, role).await?)
    }

    async fn create_student(&self, data: CreateStudent) -> StoreResult<Student> {
        Ok(Student::create(&self.pool, data).await?)
    }

    async fn find_student_by_user(&self, user_id: Uuid) -> StoreResult<Option<Student>> {
        Ok(Student::find_by_user(&self.pool, user_id).await?)
    }

    async fn create_teacher(&self, data: CreateTeacher) -> StoreResult<Teacher> {
        Ok(Teacher::create(&self.pool, data).await?)
    }

    async fn find_teacher_by_user(&self, user_id: Uuid) -> StoreResult<Option<Teacher>> {
        Ok(Teacher::find_by_user(&self.pool, user_id).await?)
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    #[instrument(skip(self, content), fields(participants = participant_ids.len()))]
    async fn open_conversation(
        &self,
        participant_ids: &[Uuid],
        sender_id: Uuid,
        content: &str,
    ) -> StoreResult<OpenedConversation> {
        let mut tx = self.pool.begin().await?;

        Conversation::lock_participant_set(&mut *tx, participant_ids).await?;

        let (conversation, created) =
            match Conversation::find_by_participant_set(&mut *tx, participant_ids).await? {
                Some(existing) => (existing, false),
                None => {
                    let conversation = Conversation::insert(&mut *tx).await?;
                    Conversation::add_participants(&mut *tx, conversation.id, participant_ids)
                        .await?;
                    (conversation, true)
                }
            };

        let message =
            Message::insert_as_participant(&mut *tx, conversation.id, sender_id, content)
                .await?
                .ok_or(StoreError::NotFound("Participant"))?;
        let conversation = Conversation::touch(&mut *tx, conversation.id, message.created_at).await?;

        tx.commit().await?;

        debug!(conversation_id = %conversation.id, created, "Conversation opened");
        Ok(OpenedConversation {
            conversation,
            message,
            created,
        })
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> StoreResult<Option<Message>> {
        let mut tx = self.pool.begin().await?;

        let Some(message) =
            Message::insert_as_participant(&mut *tx, conversation_id, sender_id, content).await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };
        Conversation::touch(&mut *tx, conversation_id, message.created_at).await?;

        tx.commit().await?;
        Ok(Some(message))
    }

    async fn list_conversations(&self, user_id: Uuid) -> StoreResult<Vec<ConversationSummary>> {
        let conversations = Conversation::list_for_user(&self.pool, user_id).await?;
        if conversations.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = conversations.iter().map(|c| c.id).collect();

        let mut participants: HashMap<Uuid, Vec<UserSummary>> = HashMap::new();
        for row in Conversation::participants_of(&self.pool, &ids).await? {
            participants
                .entry(row.conversation_id)
                .or_default()
                .push(row.into());
        }

        let mut latest: HashMap<Uuid, Message> = Message::latest_per_conversation(&self.pool, &ids)
            .await?
            .into_iter()
            .map(|m| (m.conversation_id, m))
            .collect();

        Ok(conversations
            .into_iter()
            .map(|c| ConversationSummary {
                id: c.id,
                created_at: c.created_at,
                updated_at: c.updated_at,
                participants: participants.remove(&c.id).unwrap_or_default(),
                last_message: latest.remove(&c.id),
            })
            .collect())
    }

    async fn find_conversation_for_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<ConversationThread>> {
        let Some(conversation) =
            Conversation::find_for_participant(&self.pool, conversation_id, user_id).await?
        else {
            return Ok(None);
        };

        let participants = Conversation::participants_of(&self.pool, &[conversation.id])
            .await?
            .into_iter()
            .map(UserSummary::from)
            .collect();
        let messages = Message::list_for_conversation(&self.pool, conversation.id).await?;

        Ok(Some(ConversationThread {
            id: conversation.id,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
            participants,
            messages,
        }))
    }
}

#[async_trait]
impl PasswordResetStore for PgStore {
    async fn replace_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<PasswordResetToken> {
        let mut tx = self.pool.begin().await?;
        let removed = PasswordResetToken::delete_for_user(&mut *tx, user_id).await?;
        let token = PasswordResetToken::insert(&mut *tx, user_id, token_hash, expires_at).await?;
        tx.commit().await?;

        debug!(%user_id, superseded = removed, "Password reset token issued");
        Ok(token)
    }

    async fn find_reset_token(&self, token_hash: &str) -> StoreResult<Option<PasswordResetToken>> {
        Ok(PasswordResetToken::find_by_hash(&self.pool, token_hash).await?)
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Uuid>> {
        let mut tx = self.pool.begin().await?;

        let Some(token) = PasswordResetToken::take(&mut *tx, token_hash).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        if token.is_expired_at(now) {
            // Expired tokens are dropped either way.
            tx.commit().await?;
            return Ok(None);
        }

        User::set_password_hash(&mut *tx, token.user_id, password_hash).await?;
        tx.commit().await?;
        Ok(Some(token.user_id))
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn create_course(&self, data: CreateCourse) -> StoreResult<Course> {
        Course::create(&self.pool, data)
            .await
            .map_err(|e| conflict_on_unique(e, "Course slug already exists"))
    }

    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        Ok(Course::list(&self.pool).await?)
    }

    async fn find_course_by_slug(&self, slug: &str) -> StoreResult<Option<Course>> {
        Ok(Course::find_by_slug(&self.pool, slug).await?)
    }

    async fn create_schedule(&self, data: CreateSchedule) -> StoreResult<Schedule> {
        Schedule::create(&self.pool, data).await.map_err(|e| {
            let missing_course = matches!(
                &e,
                sqlx::Error::Database(db) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION)
            );
            if missing_course {
                StoreError::NotFound("Course")
            } else {
                StoreError::Database(e)
            }
        })
    }

    async fn find_schedule(&self, id: Uuid) -> StoreResult<Option<Schedule>> {
        Ok(Schedule::find_by_id(&self.pool, id).await?)
    }

    async fn list_schedules_for_course(&self, course_id: Uuid) -> StoreResult<Vec<Schedule>> {
        Ok(Schedule::list_for_course(&self.pool, course_id).await?)
    }

    async fn list_schedules_for_teacher(&self, teacher_id: Uuid) -> StoreResult<Vec<Schedule>> {
        Ok(Schedule::list_for_teacher(&self.pool, teacher_id).await?)
    }

    async fn create_enrollment(&self, student_id: Uuid, schedule_id: Uuid) -> StoreResult<Option<Enrollment>> {
        Enrollment::create(&self.pool, student_id, schedule_id)
            .await
            .map_err(|e| conflict_on_unique(e, "Already enrolled in this schedule"))
    }

    async fn find_enrollment(&self, id: Uuid) -> StoreResult<Option<Enrollment>> {
        Ok(Enrollment::find_by_id(&self.pool, id).await?)
    }

    async fn list_enrollments_for_student(&self, student_id: Uuid) -> StoreResult<Vec<EnrollmentView>> {
        Ok(Enrollment::list_for_student(&self.pool, student_id).await?)
    }

    async fn search_enrollments(&self, status: Option<PaymentStatus>) -> StoreResult<Vec<EnrollmentView>> {
        Ok(Enrollment::search(&self.pool, status).await?)
    }

    async fn create_post(&self, data: CreateBlogPost) -> StoreResult<BlogPost> {
        BlogPost::create(&self.pool, data)
            .await
            .map_err(|e| conflict_on_unique(e, "Post slug already exists"))
    }

    async fn list_published_posts(&self) -> StoreResult<Vec<BlogPost>> {
        Ok(BlogPost::list_published(&self.pool).await?)
    }

    async fn find_published_post(&self, slug: &str) -> StoreResult<Option<BlogPost>> {
        Ok(BlogPost::find_published(&self.pool, slug).await?)
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    #[instrument(skip(self))]
    async fn apply_checkout_completed(
        &self,
        event_id: &str,
        event_type: &str,
        enrollment_id: Uuid,
    ) -> StoreResult<CheckoutOutcome> {
        let mut tx = self.pool.begin().await?;

        if !ProcessedEvent::record(&mut *tx, event_id, event_type).await? {
            tx.rollback().await?;
            return Ok(CheckoutOutcome::AlreadyProcessed);
        }

        let Some(schedule_id) = Enrollment::mark_paid(&mut *tx, enrollment_id).await? else {
            return match Enrollment::status_of(&mut *tx, enrollment_id).await? {
                Some(status) => {
                    tx.commit().await?;
                    Ok(CheckoutOutcome::NotPending(status))
                }
                None => {
                    tx.rollback().await?;
                    Ok(CheckoutOutcome::EnrollmentNotFound)
                }
            };
        };

        let current_students = Schedule::increment_students(&mut *tx, schedule_id)
            .await?
            .ok_or(StoreError::NotFound("Schedule"))?;

        tx.commit().await?;
        Ok(CheckoutOutcome::Applied {
            schedule_id,
            current_students,
        })
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(health_check(&self.pool).await?)
    }
}
