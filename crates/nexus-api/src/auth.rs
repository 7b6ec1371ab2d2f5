use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};
use uuid::Uuid;

use nexus_db::Database;
use nexus_gateway::dispatcher::Dispatcher;
use nexus_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};
use nexus_types::models::{Role, User};

use crate::error::{ApiError, ApiResult};
use crate::{ApiJson, blocking};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub dispatcher: Dispatcher,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_lowercase();

    // Validate input
    if name.is_empty() || name.len() > 80 {
        return Err(ApiError::BadRequest("name must be 1-80 characters".into()));
    }
    if !is_plausible_email(&email) {
        return Err(ApiError::BadRequest("a valid email is required".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "password must be at least 8 characters".into(),
        ));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Store(anyhow::anyhow!("password hashing failed").into())
        })?
        .to_string();

    let user = User {
        id: Uuid::new_v4(),
        name,
        email,
        role: req.role,
    };

    let db = state.db.clone();
    let row = user.clone();
    blocking(move || {
        db.create_user(&row.id.to_string(), &row.name, &row.email, &password_hash, row.role)
    })
    .await?;

    info!("Registered {} ({}) as {}", user.name, user.id, user.role);
    let token = issue_token(&state, &user)?;

    Ok((StatusCode::CREATED, axum::Json(AuthResponse { token, user })))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let db = state.db.clone();
    let email = req.email.trim().to_lowercase();
    let row = blocking(move || db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&row.password).map_err(|e| {
        error!("Stored hash for {} is unreadable: {}", row.id, e);
        ApiError::Store(anyhow::anyhow!("corrupt password hash").into())
    })?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthenticated)?;

    let user = User::try_from(row)?;
    let token = issue_token(&state, &user)?;

    Ok(axum::Json(AuthResponse { token, user }))
}

fn issue_token(state: &AppStateInner, user: &User) -> ApiResult<String> {
    create_token(
        &state.jwt_secret,
        user.id,
        &user.name,
        user.role,
        state.token_ttl_days,
    )
    .map_err(|e| ApiError::Store(e.into()))
}

pub fn create_token(
    secret: &str,
    user_id: Uuid,
    name: &str,
    role: Role,
    ttl_days: i64,
) -> anyhow::Result<String> {
    let expires_at = chrono::Duration::try_days(ttl_days)
        .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| anyhow::anyhow!("token lifetime of {} days is out of range", ttl_days))?;
    let exp = usize::try_from(expires_at.timestamp())
        .map_err(|_| anyhow::anyhow!("token expiry {} predates the epoch", expires_at))?;

    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        role,
        exp,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !email.contains(' ')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_check() {
        assert!(is_plausible_email("ann@example.com"));
        assert!(!is_plausible_email("ann.example.com"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("ann@localhost"));
        assert!(!is_plausible_email("a nn@example.com"));
    }

    #[test]
    fn absurd_token_lifetime_is_an_error() {
        let id = Uuid::new_v4();
        assert!(create_token("secret", id, "Ann", Role::Investor, 1_000_000_000_000).is_err());
        assert!(create_token("secret", id, "Ann", Role::Investor, i64::MIN).is_err());
        assert!(create_token("secret", id, "Ann", Role::Investor, 7).is_ok());
    }
}
