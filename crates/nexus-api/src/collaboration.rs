use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use nexus_types::api::{SendRequestBody, UpdateStatusBody};
use nexus_types::models::{CollaborationRequest, Role};

use crate::auth::AppState;
use crate::error::ApiResult;
use crate::middleware::AuthContext;
use crate::{ApiJson, ApiPath, blocking};

/// POST /api/collaboration/request: investors only.
pub async fn send_request(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    ApiJson(body): ApiJson<SendRequestBody>,
) -> ApiResult<impl IntoResponse> {
    ctx.require_role(Role::Investor)?;

    let db = state.db.clone();
    let request = blocking(move || {
        db.send_request(ctx.user_id, body.entrepreneur_id, &body.message)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /api/collaboration/requests: sent requests for investors, received
/// requests for entrepreneurs.
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<CollaborationRequest>>> {
    let db = state.db.clone();
    let requests = blocking(move || db.list_requests_for_user(ctx.user_id, ctx.role)).await?;
    Ok(Json(requests))
}

/// GET /api/collaboration/requests/pending: entrepreneurs only.
pub async fn list_pending(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<CollaborationRequest>>> {
    ctx.require_role(Role::Entrepreneur)?;

    let db = state.db.clone();
    let requests = blocking(move || db.list_pending_requests(ctx.user_id)).await?;
    Ok(Json(requests))
}

/// PATCH /api/collaboration/request/{id}: the receiving entrepreneur decides.
pub async fn update_status(
    State(state): State<AppState>,
    ApiPath(request_id): ApiPath<Uuid>,
    Extension(ctx): Extension<AuthContext>,
    ApiJson(body): ApiJson<UpdateStatusBody>,
) -> ApiResult<Json<CollaborationRequest>> {
    ctx.require_role(Role::Entrepreneur)?;

    let db = state.db.clone();
    let acting = ctx.user_id;
    let request = blocking(move || {
        db.update_request_status(request_id, acting, body.status, body.expected)
    })
    .await?;

    info!("Request {} {} by {}", request.id, request.status, ctx.name);
    Ok(Json(request))
}
