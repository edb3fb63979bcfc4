/// Conversation and message service
///
/// Every operation takes the caller's [`SessionContext`] (or `None` for an
/// anonymous request) and enforces membership through the store queries
/// themselves: a caller who is not a participant never sees a conversation
/// and never writes into one.
///
/// # Example
///
/// ```no_run
/// use lingua_shared::auth::session::SessionContext;
/// use lingua_shared::messaging;
/// use lingua_shared::store::memory::MemoryStore;
/// # use uuid::Uuid;
///
/// # async fn example(store: MemoryStore, alice: SessionContext, bob: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let opened = messaging::create_conversation(&store, Some(&alice), &[bob], "hi").await?;
/// messaging::send_message(&store, Some(&alice), opened.conversation.id, "hi again").await?;
/// # Ok(())
/// # }
/// ```

use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::session::{require_session, SessionContext};
use crate::error::{ServiceError, ServiceResult};
use crate::models::conversation::{ConversationSummary, ConversationThread, Message, OpenedConversation};
use crate::store::{Store, StoreError};

/// Longest accepted message, in characters
pub const MAX_MESSAGE_LENGTH: usize = 5000;

/// Trims `content` and checks it is non-empty and not too long
pub fn validate_content(content: &str) -> ServiceResult<&str> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::invalid("content", "Message must not be empty"));
    }
    if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ServiceError::invalid(
            "content",
            format!("Message must be at most {MAX_MESSAGE_LENGTH} characters"),
        ));
    }
    Ok(trimmed)
}

/// Sorted, deduplicated participant set that always includes the sender
pub fn normalize_participants(sender_id: Uuid, participant_ids: &[Uuid]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = participant_ids.to_vec();
    ids.push(sender_id);
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Sends the first message to a participant set, reusing the conversation
/// that already has exactly those participants
///
/// # Errors
///
/// - `AuthenticationRequired` without a session
/// - `ValidationFailed` for bad content or when nobody but the sender is listed
/// - `NotFound` when a listed user does not exist
/// - `Unknown` when storage fails
pub async fn create_conversation<S: Store + ?Sized>(
    store: &S,
    session: Option<&SessionContext>,
    participant_ids: &[Uuid],
    content: &str,
) -> ServiceResult<OpenedConversation> {
    let session = require_session(session)?;
    let content = validate_content(content)?;

    let participants = normalize_participants(session.user_id, participant_ids);
    if participants.len() < 2 {
        return Err(ServiceError::invalid(
            "participant_ids",
            "A conversation needs at least one other participant",
        ));
    }

    let existing = store
        .count_existing_users(&participants)
        .await
        .map_err(creation_failed)?;
    if existing != participants.len() {
        return Err(ServiceError::NotFound("Participant".to_string()));
    }

    let opened = store
        .open_conversation(&participants, session.user_id, content)
        .await
        .map_err(creation_failed)?;

    info!(
        conversation_id = %opened.conversation.id,
        sender_id = %session.user_id,
        participants = participants.len(),
        created = opened.created,
        "Opened conversation"
    );
    Ok(opened)
}

fn creation_failed(err: StoreError) -> ServiceError {
    match err {
        StoreError::NotFound(what) => ServiceError::NotFound(what.to_string()),
        other => ServiceError::internal("Conversation creation failed", other),
    }
}

/// Appends a message from the caller to a conversation they belong to
///
/// # Errors
///
/// `AuthorizationDenied` when the caller is not a participant, including
/// when the conversation does not exist. Nothing is written in that case.
pub async fn send_message<S: Store + ?Sized>(
    store: &S,
    session: Option<&SessionContext>,
    conversation_id: Uuid,
    content: &str,
) -> ServiceResult<Message> {
    let session = require_session(session)?;
    let content = validate_content(content)?;

    match store
        .append_message(conversation_id, session.user_id, content)
        .await?
    {
        Some(message) => {
            info!(%conversation_id, message_id = %message.id, "Message sent");
            Ok(message)
        }
        None => {
            warn!(%conversation_id, user_id = %session.user_id, "Rejected message from non-participant");
            Err(ServiceError::AuthorizationDenied(
                "You are not a participant of this conversation".to_string(),
            ))
        }
    }
}

/// The caller's conversations, most recently active first
pub async fn get_conversations<S: Store + ?Sized>(
    store: &S,
    session: Option<&SessionContext>,
) -> ServiceResult<Vec<ConversationSummary>> {
    let session = require_session(session)?;
    Ok(store.list_conversations(session.user_id).await?)
}

/// Full history of one of the caller's conversations
///
/// # Errors
///
/// `NotFound` both for missing conversations and for ones the caller is not in
pub async fn get_conversation_by_id<S: Store + ?Sized>(
    store: &S,
    session: Option<&SessionContext>,
    conversation_id: Uuid,
) -> ServiceResult<ConversationThread> {
    let session = require_session(session)?;
    store
        .find_conversation_for_participant(conversation_id, session.user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Conversation".to_string()))
}
