use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use nexus_db::Database;
use nexus_types::events::{GatewayCommand, GatewayEvent};
use nexus_types::models::Role;

use crate::dispatcher::Dispatcher;
use crate::session::Session;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Drive a WebSocket whose credential was already verified at the HTTP
/// upgrade. Sends `ready`, then relays events until either side goes away.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    user_id: Uuid,
    role: Role,
) {
    let (mut sender, mut receiver) = socket.split();
    let (mut session, mut events_rx) = Session::new(user_id, role, dispatcher.clone(), db);
    let conn_id = session.conn_id;

    info!("User connected: {} (user {}, {})", conn_id, user_id, role);
    session.reply(GatewayEvent::Ready { user_id, role });

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward queued events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = events_rx.recv() => {
                    let Some(event) = event else { break };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode gateway event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping {}", missed_heartbeats, conn_id);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => session.handle_command(cmd).await,
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            user_id,
                            conn_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                        session.reply(GatewayEvent::error("malformed event"));
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // No-op when the connection never joined.
    dispatcher.leave(user_id, conn_id).await;
    info!("User disconnected: {} (user {})", conn_id, user_id);
    if !dispatcher.is_online(user_id).await {
        debug!("User {} has no live connections left", user_id);
    }
}
