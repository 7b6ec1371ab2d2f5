pub mod auth;
pub mod chat;
pub mod collaboration;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod middleware;

use axum::{
    Json, Router,
    extract::{FromRequest, FromRequestParts},
    middleware::from_fn_with_state,
    routing::{get, patch, post},
};
use tracing::error;

use nexus_db::{StoreError, StoreResult};
use nexus_types::api::HealthResponse;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// JSON body extractor whose rejections use the API's error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path extractor whose rejections use the API's error shape.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Run a blocking store call off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StoreError::Storage(anyhow::anyhow!("blocking task failed: {}", e))
        })?
        .map_err(ApiError::from)
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Backend server is running!",
        timestamp: chrono::Utc::now(),
    })
}

/// Every route under `/api`, including the gateway upgrade.
pub fn routes(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/test", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/api/profile/entrepreneurs", get(directory::list_entrepreneurs))
        .route("/api/profile/investors", get(directory::list_investors))
        .route("/api/collaboration/request", post(collaboration::send_request))
        .route("/api/collaboration/request/{id}", patch(collaboration::update_status))
        .route("/api/collaboration/requests", get(collaboration::list_requests))
        .route("/api/collaboration/requests/pending", get(collaboration::list_pending))
        .route("/api/chat/connected-users", get(directory::connected_users))
        .route("/api/chat/message", post(chat::send_message))
        .route("/api/chat/{user_id}", get(chat::get_messages))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state.clone())
        .merge(gateway::gateway_routes(state))
}
