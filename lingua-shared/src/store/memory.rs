/// In-process implementation of the store traits
///
/// All state sits behind one async mutex, so every trait method is atomic
/// with respect to every other. Timestamps come from a clock that never
/// repeats a value, which keeps recency ordering deterministic when calls
/// land within the same microsecond.
///
/// Used by the integration tests and by `DATABASE_URL=memory` for local demos.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    CatalogStore, CheckoutOutcome, ConversationStore, PasswordResetStore, PaymentStore, Store,
    StoreError, StoreResult, UserStore,
};
use crate::models::{
    blog_post::{BlogPost, CreateBlogPost},
    conversation::{
        sort_by_recency, sort_history, Conversation, ConversationSummary, ConversationThread,
        Message, OpenedConversation,
    },
    course::{Course, CreateCourse, CreateSchedule, Schedule},
    enrollment::{Enrollment, EnrollmentView, PaymentStatus},
    password_reset::PasswordResetToken,
    processed_event::ProcessedEvent,
    profile::{CreateStudent, CreateTeacher, Student, Teacher},
    user::{CreateUser, UpdateProfile, User, UserFilter, UserRole, UserSummary},
};

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    students: HashMap<Uuid, Student>,
    teachers: HashMap<Uuid, Teacher>,
    courses: HashMap<Uuid, Course>,
    schedules: HashMap<Uuid, Schedule>,
    enrollments: HashMap<Uuid, Enrollment>,
    conversations: HashMap<Uuid, Conversation>,
    /// Conversation id to participant ids in join order
    participants: HashMap<Uuid, Vec<Uuid>>,
    messages: Vec<Message>,
    /// Keyed by token digest
    reset_tokens: HashMap<String, PasswordResetToken>,
    posts: HashMap<Uuid, BlogPost>,
    processed_events: HashMap<String, ProcessedEvent>,
    last_tick: Option<DateTime<Utc>>,
}

impl State {
    /// Current time, strictly after every value returned before
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_tick {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_tick = Some(next);
        next
    }

    fn summaries(&self, conversation_id: Uuid) -> Vec<UserSummary> {
        self.participants
            .get(&conversation_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.users.get(id))
            .map(User::summary)
            .collect()
    }

    fn is_participant(&self, conversation_id: Uuid, user_id: Uuid) -> bool {
        self.participants
            .get(&conversation_id)
            .is_some_and(|ids| ids.contains(&user_id))
    }

    fn find_by_participant_set(&self, ids: &[Uuid]) -> Option<Conversation> {
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        self.participants
            .iter()
            .filter(|(_, members)| {
                members.len() == wanted.len() && members.iter().all(|m| wanted.contains(m))
            })
            .filter_map(|(id, _)| self.conversations.get(id))
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .copied()
    }

    /// Inserts a message and moves the conversation's recency to it
    fn push_message(&mut self, conversation_id: Uuid, sender_id: Uuid, content: &str) -> Option<Message> {
        if !self.is_participant(conversation_id, sender_id) {
            return None;
        }
        let created_at = self.tick();
        let conversation = self.conversations.get_mut(&conversation_id)?;
        conversation.updated_at = conversation.updated_at.max(created_at);

        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            content: content.to_string(),
            created_at,
        };
        self.messages.push(message.clone());
        Some(message)
    }

    fn enrollment_view(&self, enrollment: &Enrollment) -> Option<EnrollmentView> {
        let student = self.students.get(&enrollment.student_id)?;
        let user = self.users.get(&student.user_id)?;
        let schedule = self.schedules.get(&enrollment.schedule_id)?;
        let course = self.courses.get(&schedule.course_id)?;

        Some(EnrollmentView {
            id: enrollment.id,
            schedule_id: enrollment.schedule_id,
            payment_status: enrollment.payment_status,
            created_at: enrollment.created_at,
            paid_at: enrollment.paid_at,
            student_email: user.email.clone(),
            student_name: user.name.clone(),
            course_title: course.title.clone(),
            starts_at: schedule.starts_at,
        })
    }
}

/// Store kept entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`]
    ///
    /// Lets tests exercise the failure paths of the services built on top.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored messages across all conversations
    pub async fn message_count(&self) -> usize {
        self.state.lock().await.messages.len()
    }

    /// Number of stored conversations
    pub async fn conversation_count(&self) -> usize {
        self.state.lock().await.conversations.len()
    }

    async fn state(&self) -> StoreResult<MutexGuard<'_, State>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(self.state.lock().await)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        let mut state = self.state().await?;
        let email = data.email.trim().to_string();
        if state.users.values().any(|u| u.email.eq_ignore_ascii_case(&email)) {
            return Err(StoreError::Conflict("Email already registered".to_string()));
        }

        let now = state.tick();
        let user = User {
            id: Uuid::new_v4(),
            email,
            name: data.name,
            image: data.image,
            password_hash: data.password_hash,
            role: data.role,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state().await?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim();
        Ok(self
            .state()
            .await?
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update_user_profile(&self, id: Uuid, data: UpdateProfile) -> StoreResult<Option<User>> {
        let mut state = self.state().await?;
        let now = state.tick();
        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = data.name {
            user.name = Some(name);
        }
        if let Some(image) = data.image {
            user.image = Some(image);
        }
        user.updated_at = now;
        Ok(Some(user.clone()))
    }

    async fn count_existing_users(&self, ids: &[Uuid]) -> StoreResult<usize> {
        let state = self.state().await?;
        let unique: HashSet<&Uuid> = ids.iter().collect();
        Ok(unique.into_iter().filter(|id| state.users.contains_key(*id)).count())
    }

    async fn search_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let state = self.state().await?;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let offset = usize::try_from(filter.offset).unwrap_or_default();
        let limit = usize::try_from(filter.limit).unwrap_or_default();
        Ok(users.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_users_by_role(&self, role: UserRole) -> StoreResult<i64> {
        let state = self.state().await?;
        Ok(state.users.values().filter(|u| u.role == role).count() as i64)
    }

    async fn create_student(&self, data: CreateStudent) -> StoreResult<Student> {
        let mut state = self.state().await?;
        if let Some(existing) = state.students.values().find(|s| s.user_id == data.user_id) {
            return Ok(existing.clone());
        }
        if !state.users.contains_key(&data.user_id) {
            return Err(StoreError::NotFound("User"));
        }

        let student = Student {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            phone: data.phone,
            level: data.level,
            created_at: state.tick(),
        };
        state.students.insert(student.id, student.clone());
        Ok(student)
    }

    async fn find_student_by_user(&self, user_id: Uuid) -> StoreResult<Option<Student>> {
        let state = self.state().await?;
        Ok(state.students.values().find(|s| s.user_id == user_id).cloned())
    }

    async fn create_teacher(&self, data: CreateTeacher) -> StoreResult<Teacher> {
        let mut state = self.state().await?;
        if !state.users.contains_key(&data.user_id) {
            return Err(StoreError::NotFound("User"));
        }
        let now = state.tick();

        if let Some(existing) = state.teachers.values_mut().find(|t| t.user_id == data.user_id) {
            existing.bio = data.bio;
            existing.languages = data.languages;
            return Ok(existing.clone());
        }

        let teacher = Teacher {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            bio: data.bio,
            languages: data.languages,
            created_at: now,
        };
        state.teachers.insert(teacher.id, teacher.clone());
        Ok(teacher)
    }

    async fn find_teacher_by_user(&self, user_id: Uuid) -> StoreResult<Option<Teacher>> {
        let state = self.state().await?;
        Ok(state.teachers.values().find(|t| t.user_id == user_id).cloned())
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn open_conversation(
        &self,
        participant_ids: &[Uuid],
        sender_id: Uuid,
        content: &str,
    ) -> StoreResult<OpenedConversation> {
        let mut state = self.state().await?;

        let (conversation_id, created) = match state.find_by_participant_set(participant_ids) {
            Some(existing) => (existing.id, false),
            None => {
                let now = state.tick();
                let conversation = Conversation {
                    id: Uuid::new_v4(),
                    created_at: now,
                    updated_at: now,
                };
                state.conversations.insert(conversation.id, conversation);
                state
                    .participants
                    .insert(conversation.id, participant_ids.to_vec());
                (conversation.id, true)
            }
        };

        let message = state
            .push_message(conversation_id, sender_id, content)
            .ok_or(StoreError::NotFound("Participant"))?;
        let conversation = state
            .conversations
            .get(&conversation_id)
            .copied()
            .ok_or(StoreError::NotFound("Conversation"))?;

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
        let mut state = self.state().await?;
        Ok(state.push_message(conversation_id, sender_id, content))
    }

    async fn list_conversations(&self, user_id: Uuid) -> StoreResult<Vec<ConversationSummary>> {
        let state = self.state().await?;

        let mut summaries: Vec<ConversationSummary> = state
            .conversations
            .values()
            .filter(|c| state.is_participant(c.id, user_id))
            .map(|c| ConversationSummary {
                id: c.id,
                created_at: c.created_at,
                updated_at: c.updated_at,
                participants: state.summaries(c.id),
                last_message: state
                    .messages
                    .iter()
                    .filter(|m| m.conversation_id == c.id)
                    .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
                    .cloned(),
            })
            .collect();

        sort_by_recency(&mut summaries);
        Ok(summaries)
    }

    async fn find_conversation_for_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<ConversationThread>> {
        let state = self.state().await?;
        if !state.is_participant(conversation_id, user_id) {
            return Ok(None);
        }
        let Some(conversation) = state.conversations.get(&conversation_id) else {
            return Ok(None);
        };

        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        sort_history(&mut messages);

        Ok(Some(ConversationThread {
            id: conversation.id,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
            participants: state.summaries(conversation_id),
            messages,
        }))
    }
}

#[async_trait]
impl PasswordResetStore for MemoryStore {
    async fn replace_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<PasswordResetToken> {
        let mut state = self.state().await?;
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::NotFound("User"));
        }

        state.reset_tokens.retain(|_, token| token.user_id != user_id);
        let token = PasswordResetToken {
            id: Uuid::new_v4(),
            user_id,
            token_hash: token_hash.to_string(),
            expires_at,
            created_at: state.tick(),
        };
        state.reset_tokens.insert(token.token_hash.clone(), token.clone());
        Ok(token)
    }

    async fn find_reset_token(&self, token_hash: &str) -> StoreResult<Option<PasswordResetToken>> {
        Ok(self.state().await?.reset_tokens.get(token_hash).cloned())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Uuid>> {
        let mut state = self.state().await?;
        let Some(token) = state.reset_tokens.remove(token_hash) else {
            return Ok(None);
        };
        if token.is_expired_at(now) {
            return Ok(None);
        }

        let updated_at = state.tick();
        let Some(user) = state.users.get_mut(&token.user_id) else {
            return Ok(None);
        };
        user.password_hash = Some(password_hash.to_string());
        user.updated_at = updated_at;
        Ok(Some(token.user_id))
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn create_course(&self, data: CreateCourse) -> StoreResult<Course> {
        let mut state = self.state().await?;
        if state.courses.values().any(|c| c.slug == data.slug) {
            return Err(StoreError::Conflict("Course slug already exists".to_string()));
        }

        let course = Course {
            id: Uuid::new_v4(),
            slug: data.slug,
            title: data.title,
            language: data.language,
            level: data.level,
            description: data.description,
            price_cents: data.price_cents,
            created_at: state.tick(),
        };
        state.courses.insert(course.id, course.clone());
        Ok(course)
    }

    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        let state = self.state().await?;
        let mut courses: Vec<Course> = state.courses.values().cloned().collect();
        courses.sort_by(|a, b| a.language.cmp(&b.language).then(a.title.cmp(&b.title)));
        Ok(courses)
    }

    async fn find_course_by_slug(&self, slug: &str) -> StoreResult<Option<Course>> {
        let state = self.state().await?;
        Ok(state.courses.values().find(|c| c.slug == slug).cloned())
    }

    async fn create_schedule(&self, data: CreateSchedule) -> StoreResult<Schedule> {
        let mut state = self.state().await?;
        if !state.courses.contains_key(&data.course_id) {
            return Err(StoreError::NotFound("Course"));
        }

        let schedule = Schedule {
            id: Uuid::new_v4(),
            course_id: data.course_id,
            teacher_id: data.teacher_id,
            starts_at: data.starts_at,
            ends_at: data.ends_at,
            max_students: data.max_students,
            current_students: 0,
            location: data.location,
        };
        state.schedules.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn find_schedule(&self, id: Uuid) -> StoreResult<Option<Schedule>> {
        Ok(self.state().await?.schedules.get(&id).cloned())
    }

    async fn list_schedules_for_course(&self, course_id: Uuid) -> StoreResult<Vec<Schedule>> {
        let state = self.state().await?;
        let mut schedules: Vec<Schedule> = state
            .schedules
            .values()
            .filter(|s| s.course_id == course_id)
            .cloned()
            .collect();
        schedules.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then(a.id.cmp(&b.id)));
        Ok(schedules)
    }

    async fn list_schedules_for_teacher(&self, teacher_id: Uuid) -> StoreResult<Vec<Schedule>> {
        let state = self.state().await?;
        let mut schedules: Vec<Schedule> = state
            .schedules
            .values()
            .filter(|s| s.teacher_id == Some(teacher_id))
            .cloned()
            .collect();
        schedules.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then(a.id.cmp(&b.id)));
        Ok(schedules)
    }

    async fn create_enrollment(&self, student_id: Uuid, schedule_id: Uuid) -> StoreResult<Option<Enrollment>> {
        let mut state = self.state().await?;
        if state
            .enrollments
            .values()
            .any(|e| e.student_id == student_id && e.schedule_id == schedule_id)
        {
            return Err(StoreError::Conflict("Already enrolled in this schedule".to_string()));
        }
        match state.schedules.get(&schedule_id) {
            Some(schedule) if !schedule.is_full() => {}
            _ => return Ok(None),
        }

        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            student_id,
            schedule_id,
            payment_status: PaymentStatus::Pending,
            created_at: state.tick(),
            paid_at: None,
        };
        state.enrollments.insert(enrollment.id, enrollment.clone());
        Ok(Some(enrollment))
    }

    async fn find_enrollment(&self, id: Uuid) -> StoreResult<Option<Enrollment>> {
        Ok(self.state().await?.enrollments.get(&id).cloned())
    }

    async fn list_enrollments_for_student(&self, student_id: Uuid) -> StoreResult<Vec<EnrollmentView>> {
        let state = self.state().await?;
        let mut views: Vec<EnrollmentView> = state
            .enrollments
            .values()
            .filter(|e| e.student_id == student_id)
            .filter_map(|e| state.enrollment_view(e))
            .collect();
        views.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then(a.id.cmp(&b.id)));
        Ok(views)
    }

    async fn search_enrollments(&self, status: Option<PaymentStatus>) -> StoreResult<Vec<EnrollmentView>> {
        let state = self.state().await?;
        let mut views: Vec<EnrollmentView> = state
            .enrollments
            .values()
            .filter(|e| status.map_or(true, |s| e.payment_status == s))
            .filter_map(|e| state.enrollment_view(e))
            .collect();
        views.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(views)
    }

    async fn create_post(&self, data: CreateBlogPost) -> StoreResult<BlogPost> {
        let mut state = self.state().await?;
        if state.posts.values().any(|p| p.slug == data.slug) {
            return Err(StoreError::Conflict("Post slug already exists".to_string()));
        }

        let now = state.tick();
        let post = BlogPost {
            id: Uuid::new_v4(),
            slug: data.slug,
            title: data.title,
            excerpt: data.excerpt,
            body: data.body,
            author_id: data.author_id,
            published: data.published,
            published_at: data.published.then_some(now),
            created_at: now,
        };
        state.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn list_published_posts(&self) -> StoreResult<Vec<BlogPost>> {
        let state = self.state().await?;
        let mut posts: Vec<BlogPost> = state.posts.values().filter(|p| p.published).cloned().collect();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(b.id.cmp(&a.id)));
        Ok(posts)
    }

    async fn find_published_post(&self, slug: &str) -> StoreResult<Option<BlogPost>> {
        let state = self.state().await?;
        Ok(state
            .posts
            .values()
            .find(|p| p.published && p.slug == slug)
            .cloned())
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn apply_checkout_completed(
        &self,
        event_id: &str,
        event_type: &str,
        enrollment_id: Uuid,
    ) -> StoreResult<CheckoutOutcome> {
        let mut state = self.state().await?;
        if state.processed_events.contains_key(event_id) {
            return Ok(CheckoutOutcome::AlreadyProcessed);
        }
        let Some(enrollment) = state.enrollments.get(&enrollment_id).cloned() else {
            return Ok(CheckoutOutcome::EnrollmentNotFound);
        };
        if enrollment.payment_status == PaymentStatus::Pending
            && !state.schedules.contains_key(&enrollment.schedule_id)
        {
            return Err(StoreError::NotFound("Schedule"));
        }

        let now = state.tick();
        state.processed_events.insert(
            event_id.to_string(),
            ProcessedEvent {
                event_id: event_id.to_string(),
                event_type: event_type.to_string(),
                processed_at: now,
            },
        );

        if enrollment.payment_status != PaymentStatus::Pending {
            return Ok(CheckoutOutcome::NotPending(enrollment.payment_status));
        }

        if let Some(stored) = state.enrollments.get_mut(&enrollment_id) {
            stored.payment_status = PaymentStatus::Paid;
            stored.paid_at = Some(now);
        }
        let schedule = state
            .schedules
            .get_mut(&enrollment.schedule_id)
            .ok_or(StoreError::NotFound("Schedule"))?;
        schedule.current_students += 1;

        Ok(CheckoutOutcome::Applied {
            schedule_id: schedule.id,
            current_students: schedule.current_students,
        })
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.state().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn user(store: &MemoryStore, email: &str) -> User {
        store
            .create_user(CreateUser {
                email: email.to_string(),
                name: None,
                image: None,
                password_hash: None,
                role: UserRole::Student,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_email_uniqueness_ignores_case() {
        let store = MemoryStore::new();
        user(&store, "ana@example.com").await;
        let err = store
            .create_user(CreateUser {
                email: "ANA@example.com".to_string(),
                name: None,
                image: None,
                password_hash: None,
                role: UserRole::Teacher,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(store.find_user_by_email("Ana@Example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clock_is_strictly_increasing() {
        let mut state = State::default();
        let a = state.tick();
        let b = state.tick();
        let c = state.tick();
        assert!(a < b && b < c);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));
        assert!(store.list_courses().await.is_err());
        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_exact_participant_set_match() {
        let store = MemoryStore::new();
        let a = user(&store, "a@example.com").await.id;
        let b = user(&store, "b@example.com").await.id;
        let c = user(&store, "c@example.com").await.id;

        let mut pair = vec![a, b];
        pair.sort();
        let mut trio = vec![a, b, c];
        trio.sort();

        let first = store.open_conversation(&pair, a, "hi").await.unwrap();
        let group = store.open_conversation(&trio, a, "hi all").await.unwrap();
        assert!(first.created && group.created);
        assert_ne!(first.conversation.id, group.conversation.id);

        let again = store.open_conversation(&pair, b, "hello").await.unwrap();
        assert!(!again.created);
        assert_eq!(again.conversation.id, first.conversation.id);
    }

    #[tokio::test]
    async fn test_checkout_is_applied_once() {
        let store = MemoryStore::new();
        let u = user(&store, "s@example.com").await;
        let student = store.create_student(CreateStudent::for_user(u.id)).await.unwrap();
        let course = store
            .create_course(CreateCourse {
                slug: "spanish-a1".into(),
                title: "Spanish A1".into(),
                language: "Spanish".into(),
                level: "A1".into(),
                description: String::new(),
                price_cents: 19900,
            })
            .await
            .unwrap();
        let starts_at = Utc::now();
        let schedule = store
            .create_schedule(CreateSchedule {
                course_id: course.id,
                teacher_id: None,
                starts_at,
                ends_at: starts_at + Duration::hours(2),
                max_students: 8,
                location: None,
            })
            .await
            .unwrap();
        let enrollment = store
            .create_enrollment(student.id, schedule.id)
            .await
            .unwrap()
            .unwrap();

        let first = store
            .apply_checkout_completed("evt_1", "checkout.session.completed", enrollment.id)
            .await
            .unwrap();
        assert_eq!(
            first,
            CheckoutOutcome::Applied {
                schedule_id: schedule.id,
                current_students: 1
            }
        );

        let replay = store
            .apply_checkout_completed("evt_1", "checkout.session.completed", enrollment.id)
            .await
            .unwrap();
        assert_eq!(replay, CheckoutOutcome::AlreadyProcessed);

        let other_event = store
            .apply_checkout_completed("evt_2", "checkout.session.completed", enrollment.id)
            .await
            .unwrap();
        assert_eq!(other_event, CheckoutOutcome::NotPending(PaymentStatus::Paid));

        let schedule = store.find_schedule(schedule.id).await.unwrap().unwrap();
        assert_eq!(schedule.current_students, 1);
    }
}
