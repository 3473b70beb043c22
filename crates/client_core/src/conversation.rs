use std::sync::Arc;

use chrono::Utc;
use shared::{
    domain::{ConversationId, LocalMessageId, MessageKind, UserId},
    protocol::{AppointmentSnapshot, ClientFrame, MessagePayload, SendMessageRequest, ServerFrame},
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::ClientError,
    rest::RestClient,
    timeline::{Message, MessageDraft, RemoteOutcome, Timeline},
    transport::RealtimeChannel,
};

/// Events emitted to the presentation layer over a broadcast channel.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// An optimistic placeholder was appended for an outbound send.
    MessageAppended(Message),
    /// An entry was replaced in place by its authoritative server record.
    MessageSettled(Message),
    /// A send failed; the placeholder stays in the list marked failed.
    MessageFailed(Message),
    /// A message from the peer was appended.
    RemoteMessage(Message),
    ChannelClosed,
    Error(String),
}

struct DetailState {
    timeline: Timeline,
    sending: bool,
}

/// Client for one open conversation.
///
/// Owns the timeline for the conversation in isolation; opening another
/// conversation means constructing another client, which refetches its own
/// history. Nothing is shared between instances.
pub struct ConversationClient {
    rest: RestClient,
    channel: Arc<dyn RealtimeChannel>,
    conversation_id: ConversationId,
    peer_id: UserId,
    state: Mutex<DetailState>,
    events: broadcast::Sender<ChatEvent>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ConversationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationClient")
            .field("conversation_id", &self.conversation_id)
            .field("peer_id", &self.peer_id)
            .finish_non_exhaustive()
    }
}

impl ConversationClient {
    /// Opens the conversation: resolves its id (idempotent get-or-create
    /// when only the peer is known), loads history, joins the realtime
    /// channel and starts the listener that reconciles pushed frames.
    pub async fn open(
        rest: RestClient,
        channel: Arc<dyn RealtimeChannel>,
        peer_id: UserId,
        conversation_id: Option<ConversationId>,
    ) -> Result<Arc<Self>, ClientError> {
        if peer_id.0.trim().is_empty() {
            return Err(ClientError::MissingConversationTarget);
        }

        let conversation_id = match conversation_id {
            Some(id) => id,
            None => rest.create_or_get_conversation(&peer_id).await?,
        };
        let history = rest.conversation_history(&conversation_id).await?;

        let (events, _) = broadcast::channel(256);
        let client = Arc::new(Self {
            rest,
            channel,
            conversation_id,
            peer_id,
            state: Mutex::new(DetailState {
                timeline: Timeline::new(),
                sending: false,
            }),
            events,
            listener: Mutex::new(None),
        });

        {
            let mut state = client.state.lock().await;
            state.timeline.replace_history(history);
        }

        client.channel.join(&client.conversation_id).await?;
        info!(conversation_id = %client.conversation_id, "joined realtime channel");

        let listener = client.spawn_listener();
        *client.listener.lock().await = Some(listener);

        Ok(client)
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub fn peer_id(&self) -> &UserId {
        &self.peer_id
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the current timeline.
    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.timeline.entries().to_vec()
    }

    /// Sends a plain text message.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.send(text.into(), MessageKind::Text, None).await
    }

    /// Sends a structured appointment message (the booking card rendered in
    /// the thread).
    pub async fn send_appointment(
        &self,
        text: impl Into<String>,
        appointment: AppointmentSnapshot,
    ) -> Result<(), ClientError> {
        self.send(text.into(), MessageKind::Appointment, Some(appointment))
            .await
    }

    /// Leaves the realtime channel and stops the listener. Mandatory before
    /// discarding the client; a leaked subscription would keep appending
    /// into a timeline nothing renders anymore.
    pub async fn close(&self) {
        if let Some(task) = self.listener.lock().await.take() {
            task.abort();
        }
        if let Err(err) = self.channel.leave(&self.conversation_id).await {
            warn!(conversation_id = %self.conversation_id, "failed to leave realtime channel: {err}");
        }
        let _ = self.events.send(ChatEvent::ChannelClosed);
    }

    async fn send(
        &self,
        text: String,
        kind: MessageKind,
        appointment: Option<AppointmentSnapshot>,
    ) -> Result<(), ClientError> {
        let session = self.rest.session();
        let local_id = next_local_id();
        let draft = MessageDraft {
            sender_id: session.user_id().clone(),
            sender_name: Some(session.username().to_string()),
            text: text.clone(),
            kind,
            appointment: appointment.clone(),
        };

        // Optimistic append happens before any network round-trip; the guard
        // allows one in-flight send per conversation.
        {
            let mut state = self.state.lock().await;
            if state.sending {
                return Err(ClientError::SendInFlight);
            }
            state.sending = true;
            state
                .timeline
                .append_local(local_id.clone(), draft, Utc::now());
            if let Some(entry) = state.timeline.local_entry(&local_id).cloned() {
                let _ = self.events.send(ChatEvent::MessageAppended(entry));
            }
        }

        let request = SendMessageRequest {
            receiver_id: self.peer_id.clone(),
            conversation_id: self.conversation_id.clone(),
            text,
            message_type: kind,
            appointment_data: appointment,
        };

        let result = self.rest.send_message(&request).await;
        let mut state = self.state.lock().await;
        state.sending = false;
        match result {
            Ok(payload) => {
                state.timeline.settle_delivered(&local_id, payload.clone());
                let entry = state.timeline.server_entry(&payload.message_id).cloned();
                drop(state);
                if let Some(entry) = entry {
                    let _ = self.events.send(ChatEvent::MessageSettled(entry));
                }
                // Broadcast only after the server has persisted the message,
                // so peers never see a record that was not saved.
                if let Err(err) = self
                    .channel
                    .publish(ClientFrame::SendMessage {
                        conversation_id: self.conversation_id.clone(),
                        message: payload,
                    })
                    .await
                {
                    warn!(conversation_id = %self.conversation_id, "realtime broadcast failed: {err}");
                    let _ = self
                        .events
                        .send(ChatEvent::Error(format!("realtime broadcast failed: {err}")));
                }
                Ok(())
            }
            Err(err) => {
                state.timeline.settle_failed(&local_id);
                let entry = state.timeline.local_entry(&local_id).cloned();
                drop(state);
                if let Some(entry) = entry {
                    let _ = self.events.send(ChatEvent::MessageFailed(entry));
                }
                Err(err)
            }
        }
    }

    fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let client = Arc::clone(self);
        let mut frames = client.channel.subscribe();
        tokio::spawn(async move {
            loop {
                match frames.recv().await {
                    Ok(ServerFrame::NewMessage {
                        conversation_id,
                        message,
                    }) => {
                        if conversation_id != client.conversation_id {
                            continue;
                        }
                        client.apply_remote(message).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "realtime listener lagged; frames dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            let _ = client.events.send(ChatEvent::ChannelClosed);
        })
    }

    async fn apply_remote(&self, payload: MessagePayload) {
        let message_id = payload.message_id.clone();
        let (outcome, entry) = {
            let mut state = self.state.lock().await;
            let outcome = state.timeline.apply_remote(payload);
            (outcome, state.timeline.server_entry(&message_id).cloned())
        };
        let Some(entry) = entry else {
            return;
        };
        let event = match outcome {
            RemoteOutcome::Appended => ChatEvent::RemoteMessage(entry),
            RemoteOutcome::ReplacedById | RemoteOutcome::ReplacedPending => {
                ChatEvent::MessageSettled(entry)
            }
        };
        let _ = self.events.send(event);
    }
}

/// Placeholder id: millisecond timestamp plus a random suffix, unique within
/// the session.
fn next_local_id() -> LocalMessageId {
    LocalMessageId::new(format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    ))
}
