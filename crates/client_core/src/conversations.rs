use chrono::{DateTime, Duration, Utc};
use shared::{
    domain::{ConversationId, UserId},
    protocol::{ConversationRecord, ParticipantSummary},
};
use tracing::warn;

use crate::{error::ClientError, rest::RestClient};

const UNKNOWN_USER: &str = "Unknown User";

/// One row of the conversation list, normalized for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub conversation_id: ConversationId,
    pub peer_id: UserId,
    pub display_name: String,
    pub is_store: bool,
    pub avatar: Option<String>,
    pub last_message: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub activity_label: String,
}

/// Fetches the session user's conversations and normalizes them. Records
/// whose peer cannot be resolved are dropped from the result; server order
/// is preserved.
pub async fn load_conversations(
    rest: &RestClient,
) -> Result<Vec<ConversationSummary>, ClientError> {
    let records = rest.my_conversations().await?;
    let self_id = rest.session().user_id().clone();
    let now = Utc::now();
    Ok(records
        .into_iter()
        .filter_map(|record| normalize_conversation(record, &self_id, now))
        .collect())
}

/// Resolves the "other participant" and derives the display fields. Returns
/// `None` when neither participant shape identifies a peer — such records
/// stay invisible in this view.
pub fn normalize_conversation(
    record: ConversationRecord,
    self_id: &UserId,
    now: DateTime<Utc>,
) -> Option<ConversationSummary> {
    let Some(peer) = resolve_peer(&record, self_id).cloned() else {
        warn!(
            conversation_id = %record.conversation_id,
            "dropping conversation with unresolvable peer"
        );
        return None;
    };

    let display_name = peer
        .store_name
        .clone()
        .or(peer.username)
        .unwrap_or_else(|| UNKNOWN_USER.to_string());

    Some(ConversationSummary {
        activity_label: activity_label(record.updated_at, now),
        conversation_id: record.conversation_id,
        peer_id: peer.user_id,
        display_name,
        is_store: peer.store_name.is_some(),
        avatar: peer.profile_image,
        last_message: record.last_message,
        updated_at: record.updated_at,
    })
}

fn resolve_peer<'a>(
    record: &'a ConversationRecord,
    self_id: &UserId,
) -> Option<&'a ParticipantSummary> {
    if let Some(other) = &record.other_user {
        return Some(other);
    }
    record
        .members
        .iter()
        .find(|member| member.user_id != *self_id)
}

/// Relative label for the last activity: same calendar day -> time of day,
/// within the last seven days -> weekday name, older -> month and day.
pub fn activity_label(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if timestamp.date_naive() == now.date_naive() {
        return timestamp.format("%H:%M").to_string();
    }
    let age = now.signed_duration_since(timestamp);
    if age >= Duration::zero() && age < Duration::days(7) {
        return timestamp.format("%A").to_string();
    }
    timestamp.format("%b %-d").to_string()
}

#[cfg(test)]
#[path = "tests/conversations_tests.rs"]
mod tests;
