/// Conversation, participant and message models
///
/// A conversation holds a fixed set of participants and the messages they
/// exchange. Membership is append-only and `updated_at` always equals the
/// timestamp of the latest message, which is what listings sort by.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE conversations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE participants (
///     conversation_id UUID NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id),
///     joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (conversation_id, user_id)
/// );
///
/// CREATE TABLE messages (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     conversation_id UUID NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
///     sender_id UUID NOT NULL REFERENCES users(id),
///     content TEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
/// );
/// ```
///
/// Functions taking a `PgConnection` are meant to run inside the transaction
/// opened by [`crate::store::postgres::PgStore`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::user::{UserRole, UserSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent message
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Listing entry: a conversation with who is in it and its latest message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub participants: Vec<UserSummary>,
    pub last_message: Option<Message>,
}

/// Full conversation view: participants and every message, oldest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationThread {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub participants: Vec<UserSummary>,
    pub messages: Vec<Message>,
}

/// Result of opening a conversation for a participant set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedConversation {
    pub conversation: Conversation,
    pub message: Message,
    /// `false` when an existing conversation with the same participants was reused
    pub created: bool,
}

/// Participant joined with the user's public fields
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ParticipantRow {
    pub conversation_id: Uuid,
    pub id: Uuid,
    pub name: Option<String>,
    pub image: Option<String>,
    pub role: UserRole,
}

impl From<ParticipantRow> for UserSummary {
    fn from(row: ParticipantRow) -> Self {
        UserSummary {
            id: row.id,
            name: row.name,
            image: row.image,
            role: row.role,
        }
    }
}

/// Orders message history oldest first, breaking timestamp ties by id
pub fn sort_history(messages: &mut [Message]) {
    messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

/// Orders listings most recent first, breaking ties by id
pub fn sort_by_recency(conversations: &mut [ConversationSummary]) {
    conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
}

/// Advisory-lock key shared by every request opening the same participant set
///
/// `ids` must already be sorted and deduplicated.
pub fn participant_set_key(ids: &[Uuid]) -> i64 {
    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.as_bytes());
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

impl Conversation {
    /// Serializes concurrent creation for one participant set until commit
    pub async fn lock_participant_set(
        conn: &mut PgConnection,
        ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(participant_set_key(ids))
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Finds the conversation whose participant set equals `ids` exactly
    ///
    /// `ids` must be deduplicated. A conversation matches when it has as many
    /// participants as `ids` and every one of them is in `ids`.
    pub async fn find_by_participant_set(
        conn: &mut PgConnection,
        ids: &[Uuid],
    ) -> Result<Option<Self>, sqlx::Error> {
        let Some(first) = ids.first() else {
            return Ok(None);
        };

        sqlx::query_as::<_, Conversation>(
            r#"
            SELECT c.id, c.created_at, c.updated_at
            FROM conversations c
            JOIN participants p ON p.conversation_id = c.id
            WHERE c.id IN (SELECT conversation_id FROM participants WHERE user_id = $3)
            GROUP BY c.id
            HAVING COUNT(*) = $2
               AND COUNT(*) FILTER (WHERE p.user_id = ANY($1)) = $2
            ORDER BY c.created_at, c.id
            LIMIT 1
            "#,
        )
        .bind(ids)
        .bind(ids.len() as i64)
        .bind(*first)
        .fetch_optional(conn)
        .await
    }

    pub async fn insert(conn: &mut PgConnection) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Conversation>(
            "INSERT INTO conversations DEFAULT VALUES RETURNING id, created_at, updated_at",
        )
        .fetch_one(conn)
        .await
    }

    pub async fn add_participants(
        conn: &mut PgConnection,
        conversation_id: Uuid,
        user_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO participants (conversation_id, user_id)
             SELECT $1, UNNEST($2::UUID[])
             ON CONFLICT DO NOTHING",
        )
        .bind(conversation_id)
        .bind(user_ids)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Moves the conversation's recency to `at`
    pub async fn touch(
        conn: &mut PgConnection,
        conversation_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Conversation>(
            "UPDATE conversations SET updated_at = GREATEST(updated_at, $2)
             WHERE id = $1
             RETURNING id, created_at, updated_at",
        )
        .bind(conversation_id)
        .bind(at)
        .fetch_one(conn)
        .await
    }

    /// Conversations `user_id` takes part in, most recent first
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Conversation>(
            r#"
            SELECT c.id, c.created_at, c.updated_at
            FROM conversations c
            JOIN participants p ON p.conversation_id = c.id AND p.user_id = $1
            ORDER BY c.updated_at DESC, c.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Fetches a conversation only if `user_id` participates in it
    pub async fn find_for_participant(
        pool: &PgPool,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Conversation>(
            r#"
            SELECT c.id, c.created_at, c.updated_at
            FROM conversations c
            JOIN participants p ON p.conversation_id = c.id AND p.user_id = $2
            WHERE c.id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Participants of each conversation in `conversation_ids`
    pub async fn participants_of(
        pool: &PgPool,
        conversation_ids: &[Uuid],
    ) -> Result<Vec<ParticipantRow>, sqlx::Error> {
        sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT p.conversation_id, u.id, u.name, u.image, u.role
            FROM participants p
            JOIN users u ON u.id = p.user_id
            WHERE p.conversation_id = ANY($1)
            ORDER BY p.conversation_id, p.joined_at, u.id
            "#,
        )
        .bind(conversation_ids)
        .fetch_all(pool)
        .await
    }
}

impl Message {
    /// Inserts a message only when `sender_id` is a participant
    ///
    /// The membership check and the insert are one statement, so a
    /// non-participant never produces a row.
    ///
    /// # Returns
    ///
    /// `None` when the sender is not a participant or the conversation does
    /// not exist
    pub async fn insert_as_participant(
        conn: &mut PgConnection,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (conversation_id, sender_id, content)
            SELECT p.conversation_id, p.user_id, $3
            FROM participants p
            WHERE p.conversation_id = $1 AND p.user_id = $2
            RETURNING id, conversation_id, sender_id, content, created_at
            "#,
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(content)
        .fetch_optional(conn)
        .await
    }

    /// Full history of one conversation, oldest first
    pub async fn list_for_conversation(
        pool: &PgPool,
        conversation_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            "SELECT id, conversation_id, sender_id, content, created_at
             FROM messages WHERE conversation_id = $1
             ORDER BY created_at, id",
        )
        .bind(conversation_id)
        .fetch_all(pool)
        .await
    }

    /// The newest message of each conversation in `conversation_ids`
    pub async fn latest_per_conversation(
        pool: &PgPool,
        conversation_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT DISTINCT ON (conversation_id)
                   id, conversation_id, sender_id, content, created_at
            FROM messages
            WHERE conversation_id = ANY($1)
            ORDER BY conversation_id, created_at DESC, id DESC
            "#,
        )
        .bind(conversation_ids)
        .fetch_all(pool)
        .await
    }
}
