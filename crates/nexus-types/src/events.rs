use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::SendMessageBody;
use crate::models::{ChatMessage, Role};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum GatewayEvent {
    /// Handshake accepted; the client should now join its own room.
    Ready { user_id: Uuid, role: Role },

    /// A message was stored and is being relayed to a participant.
    MessageReceived(ChatMessage),

    /// The counterpart started or stopped typing
    UserTyping { user_id: Uuid, is_typing: bool },

    /// A command from this connection failed
    MessageError { message: String },
}

impl GatewayEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::MessageError {
            message: message.into(),
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase",
    deny_unknown_fields
)]
pub enum GatewayCommand {
    /// Join the room named by the caller's own user id
    Join { user_id: Uuid },

    /// Persist a message and relay it to both participants
    SendMessage(SendMessageBody),

    Typing(TypingPayload),

    StopTyping(TypingPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TypingPayload {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
}
