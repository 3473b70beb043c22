use chrono::{DateTime, Utc};
use shared::{
    domain::{DeliveryState, LocalMessageId, MessageId, MessageKind, UserId},
    protocol::{AppointmentSnapshot, MessagePayload},
};

/// Identity of a timeline entry. Placeholder ids are assigned locally before
/// the server has persisted the message; once the authoritative record
/// arrives the entry is re-keyed to the server id in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKey {
    Local(LocalMessageId),
    Server(MessageId),
}

/// One rendered message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub key: MessageKey,
    pub sender_id: UserId,
    pub sender_name: Option<String>,
    pub text: String,
    pub kind: MessageKind,
    pub appointment: Option<AppointmentSnapshot>,
    pub sent_at: DateTime<Utc>,
    pub delivery: DeliveryState,
}

/// Outbound message content before it has been submitted.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub sender_id: UserId,
    pub sender_name: Option<String>,
    pub text: String,
    pub kind: MessageKind,
    pub appointment: Option<AppointmentSnapshot>,
}

/// What `apply_remote` did with an incoming frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// The server id was already present; the entry was refreshed in place.
    ReplacedById,
    /// A pending placeholder matched by sender and text (the echo arrived
    /// before the REST response); replaced in place.
    ReplacedPending,
    /// A genuinely new message, appended at the tail.
    Appended,
}

/// Ordered message list for one conversation, merged from three writers:
/// REST history, optimistic local sends and realtime pushes.
///
/// Entry keys are unique at all times. Order is whatever the server and the
/// append sequence produced; nothing here re-sorts by timestamp.
#[derive(Debug, Default)]
pub struct Timeline {
    entries: Vec<Message>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn server_entry(&self, id: &MessageId) -> Option<&Message> {
        self.entries
            .iter()
            .find(|entry| matches!(&entry.key, MessageKey::Server(existing) if existing == id))
    }

    pub fn local_entry(&self, id: &LocalMessageId) -> Option<&Message> {
        self.entries
            .iter()
            .find(|entry| matches!(&entry.key, MessageKey::Local(existing) if existing == id))
    }

    /// Installs fetched history, replacing whatever was present.
    pub fn replace_history(&mut self, batch: Vec<MessagePayload>) {
        self.entries = batch.into_iter().map(delivered_entry).collect();
    }

    /// Appends a pending placeholder for an outbound message at the tail.
    pub fn append_local(
        &mut self,
        local_id: LocalMessageId,
        draft: MessageDraft,
        sent_at: DateTime<Utc>,
    ) {
        self.entries.push(Message {
            key: MessageKey::Local(local_id),
            sender_id: draft.sender_id,
            sender_name: draft.sender_name,
            text: draft.text,
            kind: draft.kind,
            appointment: draft.appointment,
            sent_at,
            delivery: DeliveryState::Pending,
        });
    }

    /// Settles a successful send: the placeholder is replaced in place by
    /// the server's authoritative record, keeping its list position.
    ///
    /// When the realtime echo already claimed the server id the call is a
    /// no-op; this is the id-presence guard that keeps the REST response
    /// from inserting a duplicate after a reordered echo.
    pub fn settle_delivered(
        &mut self,
        local_id: &LocalMessageId,
        payload: MessagePayload,
    ) -> bool {
        if self.server_entry(&payload.message_id).is_some() {
            return false;
        }
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| matches!(&entry.key, MessageKey::Local(existing) if existing == local_id))
        else {
            return false;
        };
        if !entry.delivery.is_pending() {
            return false;
        }
        *entry = delivered_entry(payload);
        true
    }

    /// Settles a failed send: the placeholder stays in the list, marked
    /// failed, so the typed text is never silently dropped.
    pub fn settle_failed(&mut self, local_id: &LocalMessageId) -> bool {
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| matches!(&entry.key, MessageKey::Local(existing) if existing == local_id))
        else {
            return false;
        };
        entry.delivery = entry.delivery.settle(DeliveryState::Failed);
        entry.delivery == DeliveryState::Failed
    }

    /// Reconciles a realtime push against the current list.
    ///
    /// An exact server-id match replaces that entry in place. Failing that,
    /// a pending placeholder with the same sender and exact text is treated
    /// as the in-flight send this frame echoes and replaced in place; the
    /// content path is deliberate, since the echo and the REST response race
    /// with no ordering guarantee between the transports. Anything else is
    /// appended at the tail.
    pub fn apply_remote(&mut self, payload: MessagePayload) -> RemoteOutcome {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| {
                matches!(&entry.key, MessageKey::Server(existing) if *existing == payload.message_id)
            })
        {
            *entry = delivered_entry(payload);
            return RemoteOutcome::ReplacedById;
        }

        if let Some(entry) = self.entries.iter_mut().find(|entry| {
            entry.delivery.is_pending()
                && entry.sender_id == payload.sender_id
                && entry.text == payload.text
        }) {
            *entry = delivered_entry(payload);
            return RemoteOutcome::ReplacedPending;
        }

        self.entries.push(delivered_entry(payload));
        RemoteOutcome::Appended
    }
}

fn delivered_entry(payload: MessagePayload) -> Message {
    Message {
        key: MessageKey::Server(payload.message_id),
        sender_id: payload.sender_id,
        sender_name: payload.sender_name,
        text: payload.text,
        kind: payload.kind,
        appointment: payload.appointment,
        sent_at: payload.sent_at,
        delivery: DeliveryState::Delivered,
    }
}

#[cfg(test)]
#[path = "tests/timeline_tests.rs"]
mod tests;
