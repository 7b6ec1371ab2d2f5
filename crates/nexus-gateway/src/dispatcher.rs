use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use nexus_types::events::GatewayEvent;

pub type EventSender = mpsc::UnboundedSender<GatewayEvent>;

/// Room registry: user id -> (conn_id -> sender).
///
/// A room is named by the user id that owns it. Rooms are only mutated by
/// `join` and `leave`, each called by the owning connection.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    rooms: RwLock<HashMap<Uuid, HashMap<Uuid, EventSender>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room.
    pub async fn join(&self, room: Uuid, conn_id: Uuid, tx: EventSender) {
        let mut rooms = self.inner.rooms.write().await;
        let members = rooms.entry(room).or_default();
        members.insert(conn_id, tx);
        debug!("conn {} joined room {} ({} members)", conn_id, room, members.len());
    }

    /// Remove a connection from a room, dropping the room once empty.
    pub async fn leave(&self, room: Uuid, conn_id: Uuid) {
        let mut rooms = self.inner.rooms.write().await;
        if let Some(members) = rooms.get_mut(&room) {
            members.remove(&conn_id);
            if members.is_empty() {
                rooms.remove(&room);
            }
        }
    }

    /// Deliver an event to every connection in `room` except `except`.
    /// Returns how many connections it was handed to; zero when nobody is online.
    pub async fn send_to_room(&self, room: Uuid, event: GatewayEvent, except: Option<Uuid>) -> usize {
        let rooms = self.inner.rooms.read().await;
        let Some(members) = rooms.get(&room) else {
            return 0;
        };

        let mut delivered = 0;
        for (conn_id, tx) in members {
            if Some(*conn_id) == except {
                continue;
            }
            // A closed receiver means the connection is tearing down; its
            // leave() is on the way.
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.rooms.read().await.contains_key(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typing(user_id: Uuid) -> GatewayEvent {
        GatewayEvent::UserTyping {
            user_id,
            is_typing: true,
        }
    }

    #[tokio::test]
    async fn delivers_to_every_connection_in_room() {
        let dispatcher = Dispatcher::new();
        let room = Uuid::new_v4();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        dispatcher.join(room, Uuid::new_v4(), tx1).await;
        dispatcher.join(room, Uuid::new_v4(), tx2).await;

        let delivered = dispatcher.send_to_room(room, typing(room), None).await;
        assert_eq!(delivered, 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn except_skips_the_origin_connection() {
        let dispatcher = Dispatcher::new();
        let room = Uuid::new_v4();
        let origin = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher.join(room, origin, tx).await;

        assert_eq!(dispatcher.send_to_room(room, typing(room), Some(origin)).await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn offline_room_drops_silently() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.send_to_room(Uuid::new_v4(), typing(Uuid::nil()), None).await, 0);
    }

    #[tokio::test]
    async fn leave_removes_empty_room() {
        let dispatcher = Dispatcher::new();
        let room = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        dispatcher.join(room, a, mpsc::unbounded_channel().0).await;
        dispatcher.join(room, b, mpsc::unbounded_channel().0).await;

        dispatcher.leave(room, a).await;
        assert!(dispatcher.is_online(room).await);
        dispatcher.leave(room, a).await;
        assert!(dispatcher.is_online(room).await);

        dispatcher.leave(room, b).await;
        assert!(!dispatcher.is_online(room).await);
    }
}
