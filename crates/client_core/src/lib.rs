pub mod conversation;
pub mod conversations;
pub mod error;
pub mod rest;
pub mod session;
pub mod timeline;
pub mod transport;

pub use conversation::{ChatEvent, ConversationClient};
pub use conversations::{load_conversations, ConversationSummary};
pub use error::{ChannelError, ClientError};
pub use rest::RestClient;
pub use session::Session;
pub use timeline::{Message, MessageDraft, MessageKey, RemoteOutcome, Timeline};
pub use transport::{RealtimeChannel, WsChannel};

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
