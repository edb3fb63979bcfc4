/// Messaging endpoints
///
/// # Endpoints
///
/// - `GET  /api/conversations` - The caller's conversations, most recent first
/// - `POST /api/conversations` - Open (or reuse) a conversation with a first message
/// - `GET  /api/conversations/:id` - Full history of one conversation
/// - `POST /api/conversations/:id/messages` - Send a message
///
/// Membership is checked on every call. Reading a conversation the caller is
/// not in is a 404; writing to it is a 403.

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{ApiJson, ApiPath},
    middleware::session::Session,
    routes::{success, Success},
};
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use lingua_shared::{
    messaging,
    models::conversation::{ConversationSummary, ConversationThread, Message},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Create conversation request
#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    /// Other participants; the caller is always added
    pub participant_ids: Vec<Uuid>,

    /// First message
    pub content: String,
}

/// Send message request
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation: ConversationThread,
}

#[derive(Debug, Serialize)]
pub struct CreatedConversationResponse {
    pub conversation_id: Uuid,

    /// `false` when an existing conversation with the same participants was reused
    pub created: bool,

    pub message: Message,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: Message,
}

pub async fn list_conversations(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Json<Success<ConversationsResponse>>> {
    let conversations = messaging::get_conversations(&*state.store, session.get()).await?;
    Ok(success(ConversationsResponse { conversations }))
}

/// Opens a conversation with the given participants
///
/// # Endpoint
///
/// ```text
/// POST /api/conversations
///
/// { "participant_ids": ["uuid"], "content": "hi" }
/// ```
///
/// # Response
///
/// `201 Created` for a new conversation, `200 OK` when the message was
/// appended to the existing conversation of the same participants.
///
/// # Errors
///
/// - `400 Bad Request`: Empty or oversized content, or no other participant
/// - `401 Unauthorized`: No session
/// - `404 Not Found`: A participant does not exist
pub async fn create_conversation(
    State(state): State<AppState>,
    session: Session,
    ApiJson(req): ApiJson<CreateConversationRequest>,
) -> ApiResult<(StatusCode, Json<Success<CreatedConversationResponse>>)> {
    let opened = messaging::create_conversation(
        &*state.store,
        session.get(),
        &req.participant_ids,
        &req.content,
    )
    .await?;

    let status = if opened.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        success(CreatedConversationResponse {
            conversation_id: opened.conversation.id,
            created: opened.created,
            message: opened.message,
        }),
    ))
}

/// # Errors
///
/// - `401 Unauthorized`: No session
/// - `404 Not Found`: Unknown conversation, or the caller is not a participant
pub async fn get_conversation(
    State(state): State<AppState>,
    session: Session,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Success<ConversationResponse>>> {
    let conversation = messaging::get_conversation_by_id(&*state.store, session.get(), id).await?;
    Ok(success(ConversationResponse { conversation }))
}

/// # Errors
///
/// - `400 Bad Request`: Empty or oversized content
/// - `401 Unauthorized`: No session
/// - `403 Forbidden`: The caller is not a participant
pub async fn send_message(
    State(state): State<AppState>,
    session: Session,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Success<MessageResponse>>)> {
    let message = messaging::send_message(&*state.store, session.get(), id, &req.content).await?;
    Ok((StatusCode::CREATED, success(MessageResponse { message })))
}
