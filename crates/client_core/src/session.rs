use shared::domain::UserId;

use crate::error::ClientError;

/// Authenticated identity for one user.
///
/// Passed explicitly into every component that needs it; nothing in this
/// crate reads auth state from ambient globals, so tests can inject a fake
/// session without a provider.
#[derive(Debug, Clone)]
pub struct Session {
    server_url: String,
    user_id: UserId,
    username: String,
    token: String,
}

impl Session {
    /// Validates the session fields up front so every later operation can
    /// assume a usable identity; this is the synchronous precondition check
    /// that runs before any network call.
    pub fn new(
        server_url: impl Into<String>,
        user_id: UserId,
        username: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        if !server_url.starts_with("http://") && !server_url.starts_with("https://") {
            return Err(ClientError::InvalidSession(
                "server url must start with http:// or https://",
            ));
        }
        if user_id.0.trim().is_empty() {
            return Err(ClientError::InvalidSession("missing user id"));
        }
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ClientError::InvalidSession("missing auth token"));
        }
        Ok(Self {
            server_url,
            user_id,
            username: username.into(),
            token,
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Websocket endpoint derived from the server url (http -> ws scheme).
    pub fn ws_url(&self) -> String {
        let base = if let Some(rest) = self.server_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else {
            let rest = self
                .server_url
                .strip_prefix("http://")
                .unwrap_or(&self.server_url);
            format!("ws://{rest}")
        };
        format!("{base}/ws?user_id={}", self.user_id)
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}
