use std::sync::Arc;

use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::{
    domain::{ConversationId, UserId},
    error::ApiError,
    protocol::{
        ConversationHistoryResponse, ConversationRecord, CreateConversationRequest,
        CreateConversationResponse, MessagePayload, SendMessageRequest, SendMessageResponse,
    },
};

use crate::{error::ClientError, session::Session};

/// Thin wrapper over the backend's messaging endpoints. Every call carries
/// the session's bearer token.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    session: Arc<Session>,
}

impl RestClient {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            http: Client::new(),
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// `GET /messages/conversations` — the session user's conversations, in
    /// server order.
    pub async fn my_conversations(&self) -> Result<Vec<ConversationRecord>, ClientError> {
        let response = self
            .http
            .get(format!(
                "{}/messages/conversations",
                self.session.server_url()
            ))
            .bearer_auth(self.session.token())
            .send()
            .await?;
        decode(response).await
    }

    /// `POST /messages/conversations` — idempotent get-or-create for the
    /// thread between the session user and `receiver_id`.
    pub async fn create_or_get_conversation(
        &self,
        receiver_id: &UserId,
    ) -> Result<ConversationId, ClientError> {
        let response = self
            .http
            .post(format!(
                "{}/messages/conversations",
                self.session.server_url()
            ))
            .bearer_auth(self.session.token())
            .json(&CreateConversationRequest {
                receiver_id: receiver_id.clone(),
            })
            .send()
            .await?;
        let body: CreateConversationResponse = decode(response).await?;
        Ok(body.conversation_id)
    }

    /// `GET /messages/conversations/:id` — message history, oldest first as
    /// the server returns it.
    pub async fn conversation_history(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<MessagePayload>, ClientError> {
        let response = self
            .http
            .get(format!(
                "{}/messages/conversations/{conversation_id}",
                self.session.server_url()
            ))
            .bearer_auth(self.session.token())
            .send()
            .await?;
        let body: ConversationHistoryResponse = decode(response).await?;
        Ok(body.messages)
    }

    /// `POST /messages/send` — persists the message and returns the
    /// server-assigned record.
    pub async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<MessagePayload, ClientError> {
        let response = self
            .http
            .post(format!("{}/messages/send", self.session.server_url()))
            .bearer_auth(self.session.token())
            .json(request)
            .send()
            .await?;
        let body: SendMessageResponse = decode(response).await?;
        Ok(body.data)
    }
}

/// Maps non-success statuses to the decoded `ApiError` body when the server
/// supplied one.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let raw = response.bytes().await?;
    if let Ok(api) = serde_json::from_slice::<ApiError>(&raw) {
        return Err(ClientError::Api(api));
    }
    Err(ClientError::UnexpectedStatus(status))
}
