//! Direct messages between two users.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use nexus_types::models::ChatMessage;

use crate::models::ChatMessageRow;
use crate::directory::lookup_user;
use crate::{Database, StoreError, StoreResult, format_timestamp};

/// Counterpart id clients send before a real conversation is selected.
pub const PLACEHOLDER_COUNTERPART: &str = "connected-users";

const MESSAGE_SELECT: &str = "
    SELECT m.id, m.sender_id, m.receiver_id, m.text, m.timestamp,
           s.name, s.email, r.name, r.email
    FROM chat_messages m
    JOIN users s ON s.id = m.sender_id
    JOIN users r ON r.id = m.receiver_id";

/// Resolves a counterpart path segment. `None` means the placeholder.
pub fn parse_counterpart(raw: &str) -> StoreResult<Option<Uuid>> {
    if raw.is_empty() || raw == PLACEHOLDER_COUNTERPART {
        return Ok(None);
    }
    let id: Uuid = raw
        .parse()
        .map_err(|_| StoreError::Validation(format!("invalid user id '{}'", raw)))?;
    Ok((!id.is_nil()).then_some(id))
}

impl Database {
    /// Stores a message sent by the authenticated `caller`.
    pub fn send_message(
        &self,
        caller: Uuid,
        sender_id: Uuid,
        receiver_id: Uuid,
        text: &str,
    ) -> StoreResult<ChatMessage> {
        if sender_id != caller {
            return Err(StoreError::Forbidden(
                "you can only send messages as yourself".into(),
            ));
        }
        if text.trim().is_empty() {
            return Err(StoreError::Validation("text is required".into()));
        }

        let id = Uuid::new_v4().to_string();
        let sender = sender_id.to_string();
        let receiver = receiver_id.to_string();

        self.with_conn(|conn| {
            if lookup_user(conn, receiver_id)?.is_none() {
                return Err(StoreError::NotFound("receiver"));
            }

            conn.execute(
                "INSERT INTO chat_messages (id, sender_id, receiver_id, text, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, sender, receiver, text, format_timestamp(Utc::now())],
            )?;

            debug!("Message {} stored: {} -> {}", id, sender, receiver);
            query_message(conn, &id)?.ok_or(StoreError::NotFound("message"))
        })
    }

    /// Both directions of the conversation, oldest first.
    pub fn conversation(&self, user_a: Uuid, user_b: Uuid) -> StoreResult<Vec<ChatMessage>> {
        let sql = format!(
            "{MESSAGE_SELECT}
             WHERE (m.sender_id = ?1 AND m.receiver_id = ?2)
                OR (m.sender_id = ?2 AND m.receiver_id = ?1)
             ORDER BY m.timestamp, m.rowid"
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    [user_a.to_string(), user_b.to_string()],
                    ChatMessageRow::from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(ChatMessage::try_from).collect()
        })
    }

    /// Conversation lookup by raw counterpart id; the placeholder yields nothing.
    pub fn conversation_with(&self, user: Uuid, counterpart: &str) -> StoreResult<Vec<ChatMessage>> {
        match parse_counterpart(counterpart)? {
            Some(other) => self.conversation(user, other),
            None => Ok(Vec::new()),
        }
    }
}

fn query_message(conn: &Connection, id: &str) -> StoreResult<Option<ChatMessage>> {
    let row = conn
        .query_row(
            &format!("{MESSAGE_SELECT} WHERE m.id = ?1"),
            [id],
            ChatMessageRow::from_row,
        )
        .optional()?;

    row.map(ChatMessage::try_from).transpose()
}
