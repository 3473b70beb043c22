use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use shared::{
    domain::ConversationId,
    protocol::{ClientFrame, ServerFrame},
};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{info, warn};

use crate::error::ChannelError;

/// Seam over the realtime pub/sub connection so conversation clients can be
/// tested against in-memory fakes.
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    async fn join(&self, conversation_id: &ConversationId) -> Result<(), ChannelError>;
    async fn leave(&self, conversation_id: &ConversationId) -> Result<(), ChannelError>;
    async fn publish(&self, frame: ClientFrame) -> Result<(), ChannelError>;
    fn subscribe(&self) -> broadcast::Receiver<ServerFrame>;
}

/// Websocket-backed channel. One socket carries every joined conversation;
/// consumers route frames by conversation id.
pub struct WsChannel {
    outbound: mpsc::Sender<ClientFrame>,
    frames: broadcast::Sender<ServerFrame>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl WsChannel {
    pub async fn connect(ws_url: &str) -> Result<Self, ChannelError> {
        let (stream, _) = connect_async(ws_url)
            .await
            .map_err(|err| ChannelError::Connect(err.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let (outbound, mut outbound_rx) = mpsc::channel::<ClientFrame>(64);
        let (frames, _) = broadcast::channel(256);

        let writer_task = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!("failed to encode outbound frame: {err}");
                        continue;
                    }
                };
                if let Err(err) = sink.send(WsMessage::Text(text)).await {
                    warn!("websocket send failed: {err}");
                    break;
                }
            }
        });

        let reader_frames = frames.clone();
        let reader_task = tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(WsMessage::Text(text)) => {
                        match serde_json::from_str::<ServerFrame>(&text) {
                            Ok(frame) => {
                                let _ = reader_frames.send(frame);
                            }
                            Err(err) => warn!("ignoring malformed server frame: {err}"),
                        }
                    }
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!("websocket receive failed: {err}");
                        break;
                    }
                }
            }
            info!("realtime channel reader stopped");
        });

        Ok(Self {
            outbound,
            frames,
            reader_task,
            writer_task,
        })
    }
}

#[async_trait]
impl RealtimeChannel for WsChannel {
    async fn join(&self, conversation_id: &ConversationId) -> Result<(), ChannelError> {
        self.publish(ClientFrame::Join {
            conversation_id: conversation_id.clone(),
        })
        .await
    }

    async fn leave(&self, conversation_id: &ConversationId) -> Result<(), ChannelError> {
        self.publish(ClientFrame::Leave {
            conversation_id: conversation_id.clone(),
        })
        .await
    }

    async fn publish(&self, frame: ClientFrame) -> Result<(), ChannelError> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| ChannelError::Closed)
    }

    fn subscribe(&self) -> broadcast::Receiver<ServerFrame> {
        self.frames.subscribe()
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
