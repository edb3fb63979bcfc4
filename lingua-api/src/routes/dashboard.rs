/// Dashboard views
///
/// Page data for the signed-in area. Every route here sits behind the route
/// guard, and every response is sent with `Cache-Control: no-store` so a view
/// is always re-read after a mutation.
///
/// # Endpoints
///
/// - `GET /dashboard` - Role-aware summary
/// - `GET /dashboard/messages` - Conversation list
/// - `GET /dashboard/messages/:id` - One conversation
/// - `GET /dashboard/teacher` - Schedules taught by the caller
/// - `GET /dashboard/admin/students?q=` - Student search
/// - `GET /dashboard/admin/teachers?q=` - Teacher search
/// - `GET /dashboard/admin/enrollments?status=` - Enrollment table

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiPath, ApiQuery},
    middleware::session::AuthSession,
    routes::Success,
};
use axum::{
    extract::State,
    http::{header, HeaderValue},
    Json,
};
use lingua_shared::{
    auth::session::{require_role, SessionContext},
    catalog, messaging,
    models::{
        conversation::{ConversationSummary, ConversationThread},
        course::Schedule,
        enrollment::{EnrollmentView, PaymentStatus},
        user::{User, UserFilter, UserRole},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest page an admin table returns
const MAX_PAGE_SIZE: i64 = 100;

type View<T> = ApiResult<([(header::HeaderName, HeaderValue); 1], Json<Success<T>>)>;

fn view<T: Serialize>(data: T) -> View<T> {
    Ok((
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        Json(Success::new(data)),
    ))
}

#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub students: i64,
    pub teachers: i64,
    pub pending_enrollments: usize,
}

/// Summary shown on the dashboard home; fields depend on the role
#[derive(Debug, Serialize)]
pub struct DashboardHome {
    pub session: SessionContext,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollments: Option<Vec<EnrollmentView>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedules: Option<Vec<Schedule>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<AdminStats>,
}

#[derive(Debug, Serialize)]
pub struct MessagesView {
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Serialize)]
pub struct ConversationView {
    pub conversation: ConversationThread,
}

#[derive(Debug, Serialize)]
pub struct SchedulesView {
    pub schedules: Vec<Schedule>,
}

#[derive(Debug, Serialize)]
pub struct UsersView {
    pub users: Vec<User>,
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentsView {
    pub enrollments: Vec<EnrollmentView>,
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct EnrollmentQuery {
    pub status: Option<String>,
}

pub async fn home(State(state): State<AppState>, AuthSession(session): AuthSession) -> View<DashboardHome> {
    let mut home = DashboardHome {
        session: session.clone(),
        enrollments: None,
        schedules: None,
        stats: None,
    };

    match session.role {
        UserRole::Student => {
            home.enrollments = Some(catalog::my_enrollments(&*state.store, &session).await?);
        }
        UserRole::Teacher => {
            home.schedules = Some(catalog::my_schedules(&*state.store, &session).await?);
        }
        UserRole::Admin => {
            let pending = state
                .store
                .search_enrollments(Some(PaymentStatus::Pending))
                .await?;
            home.stats = Some(AdminStats {
                students: state.store.count_users_by_role(UserRole::Student).await?,
                teachers: state.store.count_users_by_role(UserRole::Teacher).await?,
                pending_enrollments: pending.len(),
            });
        }
    }

    view(home)
}

pub async fn messages(State(state): State<AppState>, AuthSession(session): AuthSession) -> View<MessagesView> {
    let conversations = messaging::get_conversations(&*state.store, Some(&session)).await?;
    view(MessagesView { conversations })
}

pub async fn conversation(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    ApiPath(id): ApiPath<Uuid>,
) -> View<ConversationView> {
    let conversation = messaging::get_conversation_by_id(&*state.store, Some(&session), id).await?;
    view(ConversationView { conversation })
}

pub async fn teacher(State(state): State<AppState>, AuthSession(session): AuthSession) -> View<SchedulesView> {
    require_role(&session, &[UserRole::Teacher, UserRole::Admin])?;
    let schedules = catalog::my_schedules(&*state.store, &session).await?;
    view(SchedulesView { schedules })
}

async fn search_users(state: &AppState, session: &SessionContext, role: UserRole, query: SearchQuery) -> View<UsersView> {
    require_role(session, &[UserRole::Admin])?;

    let text = query.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty());
    let filter = UserFilter {
        query: text.clone(),
        limit: query.limit.unwrap_or(50).clamp(1, MAX_PAGE_SIZE),
        offset: query.offset.unwrap_or(0).max(0),
        ..UserFilter::role(role)
    };
    let users = state.store.search_users(&filter).await?;
    view(UsersView { users, query: text })
}

pub async fn admin_students(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> View<UsersView> {
    search_users(&state, &session, UserRole::Student, query).await
}

pub async fn admin_teachers(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> View<UsersView> {
    search_users(&state, &session, UserRole::Teacher, query).await
}

/// # Errors
///
/// - `400 Bad Request`: Unknown status
pub async fn admin_enrollments(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    ApiQuery(query): ApiQuery<EnrollmentQuery>,
) -> View<EnrollmentsView> {
    require_role(&session, &[UserRole::Admin])?;

    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<PaymentStatus>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let enrollments = state.store.search_enrollments(status).await?;
    view(EnrollmentsView { enrollments, status })
}
