use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use nexus_types::api::SendMessageBody;
use nexus_types::events::GatewayEvent;
use nexus_types::models::ChatMessage;

use crate::auth::AppState;
use crate::error::ApiResult;
use crate::middleware::AuthContext;
use crate::{ApiJson, ApiPath, blocking};

/// GET /api/chat/{user_id}: conversation between the caller and `user_id`,
/// oldest first. The placeholder id returns an empty list.
pub async fn get_messages(
    State(state): State<AppState>,
    ApiPath(counterpart): ApiPath<String>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let db = state.db.clone();
    let messages = blocking(move || db.conversation_with(ctx.user_id, &counterpart)).await?;
    Ok(Json(messages))
}

/// POST /api/chat/message: store, then relay to the receiver's room if online.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    ApiJson(body): ApiJson<SendMessageBody>,
) -> ApiResult<impl IntoResponse> {
    let db = state.db.clone();
    let message = blocking(move || {
        db.send_message(ctx.user_id, body.sender_id, body.receiver_id, &body.text)
    })
    .await?;

    let delivered = state
        .dispatcher
        .send_to_room(
            message.receiver_id,
            GatewayEvent::MessageReceived(message.clone()),
            None,
        )
        .await;
    debug!("REST message {} relayed to {} connections", message.id, delivered);

    Ok((StatusCode::CREATED, Json(message)))
}
