use axum::{Extension, Json, extract::State};

use nexus_types::models::{Role, User};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiResult;
use crate::middleware::AuthContext;

/// GET /api/profile/entrepreneurs: investors browsing the other side.
pub async fn list_entrepreneurs(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<User>>> {
    ctx.require_role(Role::Investor)?;
    let db = state.db.clone();
    Ok(Json(blocking(move || db.list_by_role(Role::Entrepreneur)).await?))
}

/// GET /api/profile/investors
pub async fn list_investors(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<User>>> {
    ctx.require_role(Role::Entrepreneur)?;
    let db = state.db.clone();
    Ok(Json(blocking(move || db.list_by_role(Role::Investor)).await?))
}

/// GET /api/chat/connected-users: chat counterpart candidates.
pub async fn connected_users(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<User>>> {
    let db = state.db.clone();
    Ok(Json(blocking(move || db.connected_users(ctx.user_id)).await?))
}
