//! Database row types. These map directly to SQLite rows and are converted
//! into the `nexus-types` models at the store boundary.

use anyhow::anyhow;
use rusqlite::Row;
use uuid::Uuid;

use nexus_types::models::{ChatMessage, CollaborationRequest, RequestStatus, Role, User, UserRef};

use crate::{StoreError, StoreResult, parse_timestamp};

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub created_at: String,
}

impl UserRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password: row.get(3)?,
            role: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    pub fn role(&self) -> StoreResult<Role> {
        self.role
            .parse()
            .map_err(|e: String| StoreError::Storage(anyhow!("user {}: {}", self.id, e)))
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        Ok(User {
            id: parse_id(&row.id)?,
            role: row.role()?,
            name: row.name,
            email: row.email,
        })
    }
}

/// Collaboration request joined with both parties' display identity.
pub struct CollaborationRow {
    pub id: String,
    pub investor_id: String,
    pub entrepreneur_id: String,
    pub message: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub investor_name: String,
    pub investor_email: String,
    pub entrepreneur_name: String,
    pub entrepreneur_email: String,
}

impl CollaborationRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            investor_id: row.get(1)?,
            entrepreneur_id: row.get(2)?,
            message: row.get(3)?,
            status: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            investor_name: row.get(7)?,
            investor_email: row.get(8)?,
            entrepreneur_name: row.get(9)?,
            entrepreneur_email: row.get(10)?,
        })
    }
}

impl TryFrom<CollaborationRow> for CollaborationRequest {
    type Error = StoreError;

    fn try_from(row: CollaborationRow) -> StoreResult<Self> {
        let investor_id = parse_id(&row.investor_id)?;
        let entrepreneur_id = parse_id(&row.entrepreneur_id)?;
        let status: RequestStatus = row
            .status
            .parse()
            .map_err(|e: String| StoreError::Storage(anyhow!("request {}: {}", row.id, e)))?;

        Ok(CollaborationRequest {
            id: parse_id(&row.id)?,
            investor_id,
            entrepreneur_id,
            message: row.message,
            status,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            investor: UserRef {
                id: investor_id,
                name: row.investor_name,
                email: row.investor_email,
            },
            entrepreneur: UserRef {
                id: entrepreneur_id,
                name: row.entrepreneur_name,
                email: row.entrepreneur_email,
            },
        })
    }
}

/// Chat message joined with sender and receiver display identity.
pub struct ChatMessageRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub timestamp: String,
    pub sender_name: String,
    pub sender_email: String,
    pub receiver_name: String,
    pub receiver_email: String,
}

impl ChatMessageRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            sender_id: row.get(1)?,
            receiver_id: row.get(2)?,
            text: row.get(3)?,
            timestamp: row.get(4)?,
            sender_name: row.get(5)?,
            sender_email: row.get(6)?,
            receiver_name: row.get(7)?,
            receiver_email: row.get(8)?,
        })
    }
}

impl TryFrom<ChatMessageRow> for ChatMessage {
    type Error = StoreError;

    fn try_from(row: ChatMessageRow) -> StoreResult<Self> {
        let sender_id = parse_id(&row.sender_id)?;
        let receiver_id = parse_id(&row.receiver_id)?;

        Ok(ChatMessage {
            id: parse_id(&row.id)?,
            sender_id,
            receiver_id,
            text: row.text,
            timestamp: parse_timestamp(&row.timestamp)?,
            sender: UserRef {
                id: sender_id,
                name: row.sender_name,
                email: row.sender_email,
            },
            receiver: UserRef {
                id: receiver_id,
                name: row.receiver_name,
                email: row.receiver_email,
            },
        })
    }
}

fn parse_id(raw: &str) -> StoreResult<Uuid> {
    raw.parse()
        .map_err(|e| StoreError::Storage(anyhow!("Corrupt id '{}': {}", raw, e)))
}
