//! Live WebSocket sessions against a served router.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use uuid::Uuid;

use nexus_api::auth::{AppState, AppStateInner, create_token};
use nexus_db::Database;
use nexus_gateway::dispatcher::Dispatcher;
use nexus_types::models::Role;

const SECRET: &str = "gateway-test-secret";

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Server {
    addr: SocketAddr,
    state: AppState,
}

impl Server {
    async fn start() -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db: Arc::new(Database::open_in_memory().unwrap()),
            jwt_secret: SECRET.into(),
            token_ttl_days: 1,
            dispatcher: Dispatcher::new(),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = nexus_api::routes(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    /// Creates an account directly in the store and returns (id, token).
    fn user(&self, name: &str, role: Role) -> (Uuid, String) {
        let id = Uuid::new_v4();
        self.state
            .db
            .create_user(&id.to_string(), name, &format!("{}@nexus.test", name), "hash", role)
            .unwrap();
        (id, create_token(SECRET, id, name, role, 1).unwrap())
    }

    async fn connect(&self, token: &str) -> Result<Client, WsError> {
        let url = format!("ws://{}/api/gateway?token={}", self.addr, token);
        connect_async(url).await.map(|(stream, _)| stream)
    }

    async fn wait_online(&self, user: Uuid, online: bool) {
        let dispatcher = &self.state.dispatcher;
        tokio::time::timeout(Duration::from_secs(5), async {
            while dispatcher.is_online(user).await != online {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("user {} never became online={}", user, online));
    }
}

async fn next_event(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for an event")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send(client: &mut Client, command: Value) {
    client
        .send(Message::Text(command.to_string().into()))
        .await
        .unwrap();
}

#[tokio::test]
async fn bad_token_never_upgrades() {
    let server = Server::start().await;

    match server.connect("not-a-token").await {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 401),
        Err(other) => panic!("unexpected handshake error: {}", other),
        Ok(_) => panic!("upgrade succeeded without a valid token"),
    }
}

#[tokio::test]
async fn joined_room_is_released_on_disconnect() {
    let server = Server::start().await;
    let (ann, token) = server.user("ann", Role::Investor);

    let mut client = server.connect(&token).await.unwrap();
    let ready = next_event(&mut client).await;
    assert_eq!(ready["type"], "ready");
    assert_eq!(ready["data"]["userId"], ann.to_string());

    send(&mut client, json!({ "type": "join", "data": { "userId": ann } })).await;
    server.wait_online(ann, true).await;

    client.close(None).await.unwrap();
    drop(client);
    server.wait_online(ann, false).await;
}

#[tokio::test]
async fn message_over_socket_reaches_joined_receiver() {
    let server = Server::start().await;
    let (u1, t1) = server.user("u1", Role::Investor);
    let (u2, t2) = server.user("u2", Role::Entrepreneur);

    let mut c1 = server.connect(&t1).await.unwrap();
    let mut c2 = server.connect(&t2).await.unwrap();
    next_event(&mut c1).await;
    next_event(&mut c2).await;

    send(&mut c1, json!({ "type": "join", "data": { "userId": u1 } })).await;
    send(&mut c2, json!({ "type": "join", "data": { "userId": u2 } })).await;
    server.wait_online(u1, true).await;
    server.wait_online(u2, true).await;

    send(
        &mut c1,
        json!({
            "type": "sendMessage",
            "data": { "senderId": u1, "receiverId": u2, "text": "hello" }
        }),
    )
    .await;

    let echo = next_event(&mut c1).await;
    let delivered = next_event(&mut c2).await;
    assert_eq!(echo["type"], "messageReceived");
    assert_eq!(delivered["type"], "messageReceived");
    assert_eq!(delivered["data"]["text"], "hello");
    assert_eq!(delivered["data"]["id"], echo["data"]["id"]);

    assert_eq!(server.state.db.conversation(u1, u2).unwrap().len(), 1);
}
