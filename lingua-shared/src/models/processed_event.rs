/// Payment-provider events that have already been applied
///
/// The event id is the primary key, so recording an event is an atomic
/// check-and-insert: the insert affects zero rows when the event was seen
/// before.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProcessedEvent {
    pub event_id: String,
    pub event_type: String,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedEvent {
    /// Records the event, returning `false` if it was already recorded
    pub async fn record(
        conn: &mut PgConnection,
        event_id: &str,
        event_type: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO processed_events (event_id, event_type) VALUES ($1, $2)
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(event_id)
        .bind(event_type)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
