use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(ConversationId);
id_newtype!(MessageId);
// Placeholder id assigned by the client before the server has persisted the
// message; unique within the session, never sent over the wire.
id_newtype!(LocalMessageId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Appointment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

/// Client-side delivery lifecycle for an outbound message.
///
/// `Pending` is the only state that may transition; `Delivered` and `Failed`
/// are terminal. A resend is a fresh placeholder, never a transition out of a
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Delivered,
    Failed,
}

impl DeliveryState {
    pub fn is_pending(self) -> bool {
        matches!(self, DeliveryState::Pending)
    }

    /// Applies a settlement outcome; terminal states are kept as-is.
    pub fn settle(self, outcome: DeliveryState) -> DeliveryState {
        match self {
            DeliveryState::Pending => outcome,
            terminal => terminal,
        }
    }
}
