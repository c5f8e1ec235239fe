use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod events;
pub mod session;

/// Unique identifier for a connected WebSocket subscriber.
///
/// Assigned when the connection registers; used for precise cleanup when
/// the connection closes so room lists never leak dead senders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
struct Subscriber {
    id: SubscriberId,
    sender: UnboundedSender<String>,
}

#[derive(Default)]
struct Inner {
    /// room name -> subscribers currently joined
    rooms: HashMap<String, Vec<Subscriber>>,
    /// every live connection, for namespace-wide broadcasts (presence)
    peers: Vec<Subscriber>,
}

/// Room membership registry for all live connections.
///
/// Room names are opaque strings built by [`crate::keys`]: a channel id,
/// a conversation id, or a `user:{identifier}` personal room. A
/// connection may sit in many rooms; the same user may hold several
/// connections (multi-socket), and a personal-room multicast reaches all
/// of them.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection. Returns its id and the receiving half
    /// the session forwards to the socket.
    pub async fn connect(&self) -> (SubscriberId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let id = SubscriberId::new();
        let mut guard = self.inner.write().await;
        guard.peers.push(Subscriber { id, sender: tx });
        (id, rx)
    }

    /// Drop the connection from every room and the peer list.
    pub async fn disconnect(&self, id: SubscriberId) {
        let mut guard = self.inner.write().await;
        guard.peers.retain(|s| s.id != id);
        guard.rooms.retain(|_, subscribers| {
            subscribers.retain(|s| s.id != id);
            !subscribers.is_empty()
        });
    }

    /// Join a room. No-op if already joined.
    pub async fn join(&self, room: &str, id: SubscriberId) {
        let mut guard = self.inner.write().await;
        let Some(sender) = guard.peers.iter().find(|s| s.id == id).map(|s| s.sender.clone())
        else {
            return;
        };
        let subscribers = guard.rooms.entry(room.to_string()).or_default();
        if subscribers.iter().all(|s| s.id != id) {
            subscribers.push(Subscriber { id, sender });
            tracing::debug!(%room, "subscriber joined room");
        }
    }

    /// Unconditional removal from a single room.
    pub async fn leave(&self, room: &str, id: SubscriberId) {
        let mut guard = self.inner.write().await;
        if let Some(subscribers) = guard.rooms.get_mut(room) {
            subscribers.retain(|s| s.id != id);
            if subscribers.is_empty() {
                guard.rooms.remove(room);
            }
        }
    }

    /// Leave every room except the ones named in `keep`. Used on
    /// conversation switches: a connection holds at most one active
    /// conversation room plus its personal room.
    pub async fn leave_all_except(&self, id: SubscriberId, keep: &[&str]) {
        let mut guard = self.inner.write().await;
        guard.rooms.retain(|room, subscribers| {
            if !keep.contains(&room.as_str()) {
                subscribers.retain(|s| s.id != id);
            }
            !subscribers.is_empty()
        });
    }

    /// Multicast to every subscriber of a room, pruning dead senders.
    pub async fn broadcast(&self, room: &str, msg: &str) {
        let mut guard = self.inner.write().await;
        if let Some(subscribers) = guard.rooms.get_mut(room) {
            subscribers.retain(|s| s.sender.send(msg.to_string()).is_ok());
            if subscribers.is_empty() {
                guard.rooms.remove(room);
            }
        }
    }

    /// Direct delivery to a single connection (replies, error events).
    pub async fn send_to(&self, id: SubscriberId, msg: &str) {
        let guard = self.inner.read().await;
        if let Some(subscriber) = guard.peers.iter().find(|s| s.id == id) {
            let _ = subscriber.sender.send(msg.to_string());
        }
    }

    /// Broadcast to every live connection (presence fan-out).
    pub async fn broadcast_all(&self, msg: &str) {
        let mut guard = self.inner.write().await;
        guard.peers.retain(|s| s.sender.send(msg.to_string()).is_ok());
    }

    /// True when some connection sits in both rooms. With `b` a personal
    /// room this answers "is that user actively joined to room `a`",
    /// which is what the unread engine uses to skip counting for members
    /// who are currently reading.
    pub async fn rooms_intersect(&self, a: &str, b: &str) -> bool {
        let guard = self.inner.read().await;
        let (Some(left), Some(right)) = (guard.rooms.get(a), guard.rooms.get(b)) else {
            return false;
        };
        left.iter().any(|s| right.iter().any(|t| t.id == s.id))
    }

    pub async fn room_size(&self, room: &str) -> usize {
        let guard = self.inner.read().await;
        guard.rooms.get(room).map(|v| v.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn join_leave_and_broadcast() {
        let registry = ConnectionRegistry::new();
        let (id, mut rx) = registry.connect().await;
        registry.join("room-a", id).await;

        registry.broadcast("room-a", "hello").await;
        assert_eq!(rx.recv().await.unwrap(), "hello");

        registry.leave("room-a", id).await;
        registry.broadcast("room-a", "again").await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn leave_all_except_keeps_personal_room() {
        let registry = ConnectionRegistry::new();
        let (id, mut rx) = registry.connect().await;
        registry.join("user:alice", id).await;
        registry.join("old-conversation", id).await;

        registry
            .leave_all_except(id, &["user:alice", "new-conversation"])
            .await;
        registry.join("new-conversation", id).await;

        registry.broadcast("old-conversation", "stale").await;
        registry.broadcast("user:alice", "direct").await;
        registry.broadcast("new-conversation", "fresh").await;

        assert_eq!(rx.recv().await.unwrap(), "direct");
        assert_eq!(rx.recv().await.unwrap(), "fresh");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn switching_rooms_drops_previous_conversation() {
        let registry = ConnectionRegistry::new();
        let (id, mut rx) = registry.connect().await;
        registry.join("user:alice", id).await;
        registry.join("conv-a", id).await;

        // Same sequence a channel or conversation join performs.
        registry.leave_all_except(id, &["user:alice", "channel-1"]).await;
        registry.join("user:alice", id).await;
        registry.join("channel-1", id).await;

        registry.broadcast("conv-a", "stale dm").await;
        registry.broadcast("channel-1", "channel msg").await;
        registry.broadcast("user:alice", "unread push").await;

        assert_eq!(rx.recv().await.unwrap(), "channel msg");
        assert_eq!(rx.recv().await.unwrap(), "unread push");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn rooms_intersect_detects_active_reader() {
        let registry = ConnectionRegistry::new();
        let (reader, _rx1) = registry.connect().await;
        registry.join("channel-1", reader).await;
        registry.join("user:bob", reader).await;

        let (other, _rx2) = registry.connect().await;
        registry.join("user:dana", other).await;

        assert!(registry.rooms_intersect("channel-1", "user:bob").await);
        assert!(!registry.rooms_intersect("channel-1", "user:dana").await);
    }

    #[tokio::test]
    async fn multi_socket_personal_room_reaches_all_connections() {
        let registry = ConnectionRegistry::new();
        let (first, mut rx1) = registry.connect().await;
        let (second, mut rx2) = registry.connect().await;
        registry.join("user:alice", first).await;
        registry.join("user:alice", second).await;

        registry.broadcast("user:alice", "ping").await;
        assert_eq!(rx1.recv().await.unwrap(), "ping");
        assert_eq!(rx2.recv().await.unwrap(), "ping");
    }

    #[tokio::test]
    async fn disconnect_cleans_every_room() {
        let registry = ConnectionRegistry::new();
        let (id, _rx) = registry.connect().await;
        registry.join("a", id).await;
        registry.join("b", id).await;

        registry.disconnect(id).await;
        assert_eq!(registry.room_size("a").await, 0);
        assert_eq!(registry.room_size("b").await, 0);
    }
}
