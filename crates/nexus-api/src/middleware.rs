use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, authorization::Bearer};
use axum_extra::typed_header::{TypedHeader, TypedHeaderRejection};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;
use uuid::Uuid;

use nexus_types::api::Claims;
use nexus_types::models::Role;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// Identity resolved from a verified credential. Produced once per request
/// (or per gateway connection) and handed to handlers explicitly.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
}

impl AuthContext {
    pub fn require_role(&self, role: Role) -> ApiResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "Access denied: {} role required",
                role
            )))
        }
    }
}

/// Stateless credential check: any valid, unexpired token is accepted.
pub fn verify_token(secret: &str, token: &str) -> ApiResult<AuthContext> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!("Token rejected: {}", e);
        ApiError::Unauthenticated
    })?;

    let claims = token_data.claims;
    Ok(AuthContext {
        user_id: claims.sub,
        name: claims.name,
        role: claims.role,
    })
}

/// Extract and validate JWT from Authorization header. A missing header and
/// one that is not a well-formed bearer credential are both unauthenticated.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|e| {
        debug!("Authorization header rejected: {}", e);
        ApiError::Unauthenticated
    })?;
    let ctx = verify_token(&state.jwt_secret, bearer.token())?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}
