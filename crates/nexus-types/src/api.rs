use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{RequestStatus, Role, User};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the gateway handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned by both register and login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

// -- Collaboration --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendRequestBody {
    pub entrepreneur_id: Uuid,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusBody {
    pub status: RequestStatus,
    /// When set, the update only applies if the stored status still matches.
    #[serde(default)]
    pub expected: Option<RequestStatus>,
}

// -- Chat --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendMessageBody {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    #[serde(alias = "message")]
    pub text: String,
}

// -- Misc --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub message: &'static str,
    pub timestamp: DateTime<Utc>,
}
