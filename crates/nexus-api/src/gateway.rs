use axum::{
    Router,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::rejection::WebSocketUpgradeRejection,
    },
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::warn;

use nexus_db::StoreError;
use nexus_gateway::connection;

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::middleware::verify_token;

#[derive(Deserialize)]
pub struct GatewayQuery {
    token: Option<String>,
}

pub fn gateway_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/gateway", get(ws_upgrade))
        .with_state(state)
}

/// GET /api/gateway?token=...: the credential is checked before upgrading,
/// so a missing or bad token gets a 401 and never a socket.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let user = match authenticate(&state, query.token).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!("Gateway request from {} was not a WebSocket upgrade", user.id);
            return rejection.into_response();
        }
    };

    let dispatcher = state.dispatcher.clone();
    let db = state.db.clone();
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, dispatcher, db, user.id, user.role)
    })
}

/// Token first, then the account it names; a token for a vanished user is
/// as good as no token.
async fn authenticate(state: &AppState, token: Option<String>) -> ApiResult<nexus_types::models::User> {
    let token = token.ok_or(ApiError::Unauthenticated)?;
    let ctx = verify_token(&state.jwt_secret, &token)?;

    let db = state.db.clone();
    blocking(move || db.find_user(ctx.user_id))
        .await
        .map_err(|e| match e {
            ApiError::Store(StoreError::NotFound(_)) => ApiError::Unauthenticated,
            other => other,
        })
}
