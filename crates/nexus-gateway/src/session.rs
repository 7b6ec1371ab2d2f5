//! Per-connection command handling, independent of the socket.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use nexus_db::{Database, StoreError};
use nexus_types::api::SendMessageBody;
use nexus_types::events::{GatewayCommand, GatewayEvent, TypingPayload};
use nexus_types::models::Role;

use crate::dispatcher::{Dispatcher, EventSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handshake passed, no room yet.
    Authenticated,
    /// Member of its own room; may send and receive events.
    Joined,
}

pub struct Session {
    pub conn_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    state: SessionState,
    tx: EventSender,
    dispatcher: Dispatcher,
    db: Arc<Database>,
}

impl Session {
    /// Returns the session plus the receiver carrying every event destined
    /// for this connection.
    pub fn new(
        user_id: Uuid,
        role: Role,
        dispatcher: Dispatcher,
        db: Arc<Database>,
    ) -> (Self, mpsc::UnboundedReceiver<GatewayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            conn_id: Uuid::new_v4(),
            user_id,
            role,
            state: SessionState::Authenticated,
            tx,
            dispatcher,
            db,
        };
        (session, rx)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Push an event to this connection only.
    pub fn reply(&self, event: GatewayEvent) {
        let _ = self.tx.send(event);
    }

    pub async fn handle_command(&mut self, cmd: GatewayCommand) {
        match cmd {
            GatewayCommand::Join { user_id } => self.join(user_id).await,

            _ if self.state != SessionState::Joined => {
                warn!("{} ({}) sent an event before joining", self.user_id, self.conn_id);
                self.reply(GatewayEvent::error("join your room before sending events"));
            }

            GatewayCommand::SendMessage(body) => self.send_message(body).await,
            GatewayCommand::Typing(payload) => self.relay_typing(payload, true).await,
            GatewayCommand::StopTyping(payload) => self.relay_typing(payload, false).await,
        }
    }

    async fn join(&mut self, room: Uuid) {
        if room != self.user_id {
            warn!("{} tried to join foreign room {}", self.user_id, room);
            self.reply(GatewayEvent::error("you can only join your own room"));
            return;
        }
        if self.state == SessionState::Joined {
            debug!("{} ({}) already joined", self.user_id, self.conn_id);
            return;
        }

        self.dispatcher
            .join(room, self.conn_id, self.tx.clone())
            .await;
        self.state = SessionState::Joined;
        info!("User {} joined their room", self.user_id);
    }

    async fn send_message(&self, body: SendMessageBody) {
        let db = self.db.clone();
        let caller = self.user_id;
        let SendMessageBody {
            sender_id,
            receiver_id,
            text,
        } = body;

        let result = tokio::task::spawn_blocking(move || {
            db.send_message(caller, sender_id, receiver_id, &text)
        })
        .await
        .unwrap_or_else(|e| Err(StoreError::Storage(anyhow::anyhow!("join error: {}", e))));

        match result {
            Ok(message) => {
                let event = GatewayEvent::MessageReceived(message);
                self.reply(event.clone());
                let delivered = self
                    .dispatcher
                    .send_to_room(receiver_id, event, Some(self.conn_id))
                    .await;
                debug!(
                    "Message sent from {} to {} ({} live connections)",
                    sender_id, receiver_id, delivered
                );
            }
            Err(StoreError::Storage(e)) => {
                error!("Error handling message from {}: {}", self.user_id, e);
                self.reply(GatewayEvent::error("Failed to send message"));
            }
            Err(e) => {
                warn!("Rejected message from {}: {}", self.user_id, e);
                self.reply(GatewayEvent::error(e.to_string()));
            }
        }
    }

    async fn relay_typing(&self, payload: TypingPayload, is_typing: bool) {
        if payload.sender_id != self.user_id {
            warn!(
                "{} sent typing event as {}, dropping",
                self.user_id, payload.sender_id
            );
            return;
        }

        self.dispatcher
            .send_to_room(
                payload.receiver_id,
                GatewayEvent::UserTyping {
                    user_id: self.user_id,
                    is_typing,
                },
                Some(self.conn_id),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_types::models::User;

    struct Fixture {
        db: Arc<Database>,
        dispatcher: Dispatcher,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                db: Arc::new(Database::open_in_memory().unwrap()),
                dispatcher: Dispatcher::new(),
            }
        }

        fn user(&self, name: &str, role: Role) -> User {
            let id = Uuid::new_v4();
            let email = format!("{}@example.com", name);
            self.db
                .create_user(&id.to_string(), name, &email, "hash", role)
                .unwrap();
            User {
                id,
                name: name.into(),
                email,
                role,
            }
        }

        async fn joined(&self, user: &User) -> (Session, mpsc::UnboundedReceiver<GatewayEvent>) {
            let (mut session, rx) =
                Session::new(user.id, user.role, self.dispatcher.clone(), self.db.clone());
            session
                .handle_command(GatewayCommand::Join { user_id: user.id })
                .await;
            assert_eq!(session.state(), SessionState::Joined);
            (session, rx)
        }
    }

    fn send(sender: &User, receiver: &User, text: &str) -> GatewayCommand {
        GatewayCommand::SendMessage(SendMessageBody {
            sender_id: sender.id,
            receiver_id: receiver.id,
            text: text.into(),
        })
    }

    #[tokio::test]
    async fn message_reaches_sender_and_receiver_room_only() {
        let fx = Fixture::new();
        let u1 = fx.user("u1", Role::Investor);
        let u2 = fx.user("u2", Role::Entrepreneur);
        let u3 = fx.user("u3", Role::Entrepreneur);

        let (mut s1, mut rx1) = fx.joined(&u1).await;
        let (_s2, mut rx2) = fx.joined(&u2).await;
        let (_s3, mut rx3) = fx.joined(&u3).await;

        s1.handle_command(send(&u1, &u2, "hello")).await;

        let GatewayEvent::MessageReceived(echo) = rx1.try_recv().unwrap() else {
            panic!("sender should get an echo");
        };
        let GatewayEvent::MessageReceived(delivered) = rx2.try_recv().unwrap() else {
            panic!("receiver should get the message");
        };
        assert_eq!(echo, delivered);
        assert_eq!(delivered.text, "hello");
        assert_eq!(delivered.sender_id, u1.id);
        assert!(rx3.try_recv().is_err());

        assert_eq!(fx.db.conversation(u1.id, u2.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn offline_receiver_still_gets_stored_message() {
        let fx = Fixture::new();
        let u1 = fx.user("u1", Role::Investor);
        let u2 = fx.user("u2", Role::Entrepreneur);
        let (mut s1, mut rx1) = fx.joined(&u1).await;

        s1.handle_command(send(&u1, &u2, "later")).await;

        assert!(matches!(rx1.try_recv(), Ok(GatewayEvent::MessageReceived(_))));
        let stored = fx.db.conversation(u2.id, u1.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "later");
    }

    #[tokio::test]
    async fn spoofed_sender_gets_error_and_nothing_is_stored() {
        let fx = Fixture::new();
        let u1 = fx.user("u1", Role::Investor);
        let u2 = fx.user("u2", Role::Entrepreneur);
        let (mut s1, mut rx1) = fx.joined(&u1).await;
        let (_s2, mut rx2) = fx.joined(&u2).await;

        s1.handle_command(send(&u2, &u1, "as someone else")).await;

        assert!(matches!(rx1.try_recv(), Ok(GatewayEvent::MessageError { .. })));
        assert!(rx2.try_recv().is_err());
        assert!(fx.db.conversation(u1.id, u2.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn events_before_join_are_refused() {
        let fx = Fixture::new();
        let u1 = fx.user("u1", Role::Investor);
        let u2 = fx.user("u2", Role::Entrepreneur);
        let (mut s1, mut rx1) =
            Session::new(u1.id, u1.role, fx.dispatcher.clone(), fx.db.clone());

        s1.handle_command(send(&u1, &u2, "too early")).await;

        assert!(matches!(rx1.try_recv(), Ok(GatewayEvent::MessageError { .. })));
        assert!(fx.db.conversation(u1.id, u2.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn cannot_join_foreign_room() {
        let fx = Fixture::new();
        let u1 = fx.user("u1", Role::Investor);
        let (mut s1, mut rx1) =
            Session::new(u1.id, u1.role, fx.dispatcher.clone(), fx.db.clone());

        let victim = Uuid::new_v4();
        s1.handle_command(GatewayCommand::Join { user_id: victim }).await;

        assert_eq!(s1.state(), SessionState::Authenticated);
        assert!(matches!(rx1.try_recv(), Ok(GatewayEvent::MessageError { .. })));
        assert!(!fx.dispatcher.is_online(victim).await);
    }

    #[tokio::test]
    async fn typing_is_relayed_to_receiver_without_storage() {
        let fx = Fixture::new();
        let u1 = fx.user("u1", Role::Investor);
        let u2 = fx.user("u2", Role::Entrepreneur);
        let (mut s1, mut rx1) = fx.joined(&u1).await;
        let (_s2, mut rx2) = fx.joined(&u2).await;

        let payload = TypingPayload {
            sender_id: u1.id,
            receiver_id: u2.id,
        };
        s1.handle_command(GatewayCommand::Typing(payload.clone())).await;
        s1.handle_command(GatewayCommand::StopTyping(payload)).await;

        let flags: Vec<bool> = std::iter::from_fn(|| rx2.try_recv().ok())
            .map(|event| match event {
                GatewayEvent::UserTyping { user_id, is_typing } => {
                    assert_eq!(user_id, u1.id);
                    is_typing
                }
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(flags, [true, false]);
        assert!(rx1.try_recv().is_err());
        assert!(fx.db.conversation(u1.id, u2.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn spoofed_typing_is_dropped() {
        let fx = Fixture::new();
        let u1 = fx.user("u1", Role::Investor);
        let u2 = fx.user("u2", Role::Entrepreneur);
        let (mut s1, _rx1) = fx.joined(&u1).await;
        let (_s2, mut rx2) = fx.joined(&u2).await;

        s1.handle_command(GatewayCommand::Typing(TypingPayload {
            sender_id: Uuid::new_v4(),
            receiver_id: u2.id,
        }))
        .await;

        assert!(rx2.try_recv().is_err());
    }
}
