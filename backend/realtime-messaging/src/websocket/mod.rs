use crate::models::{ConnectionId, UserId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;

pub mod events;
pub mod gateway;
pub mod presence;
pub mod session;

pub use events::{Ack, ClientEvent, ServerEvent};
pub use gateway::{ChatConnection, ConnectionState, MessagingGateway};
pub use presence::PresenceRegistry;

/// Broadcast group name. Only constructible through [`RoomName::mailbox`] and
/// [`RoomName::conversation`], so two different rooms can never share a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomName(String);

impl RoomName {
    /// Per-user room joined by every connection of that user
    pub fn mailbox(user: UserId) -> Self {
        Self(format!("user-{}", user))
    }

    /// Pairwise room; argument order does not matter
    pub fn conversation(a: UserId, b: UserId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("chat-{}-{}", lo, hi))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room membership and fan-out for live connections.
///
/// Lock order is memberships, then rooms, then senders. No guard is held while a
/// frame is pushed into a channel.
#[derive(Default)]
pub struct RoomRouter {
    senders: DashMap<ConnectionId, UnboundedSender<String>>,
    rooms: DashMap<RoomName, HashSet<ConnectionId>>,
    memberships: DashMap<ConnectionId, HashSet<RoomName>>,
}

impl RoomRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection: ConnectionId, sender: UnboundedSender<String>) {
        self.senders.insert(connection, sender);
        self.memberships.entry(connection).or_default();
    }

    /// Join `room`. Returns false when the connection was already a member or is not
    /// registered; neither is an error.
    pub fn join(&self, connection: ConnectionId, room: RoomName) -> bool {
        let Some(mut joined) = self.memberships.get_mut(&connection) else {
            return false;
        };
        if !joined.insert(room.clone()) {
            return false;
        }
        self.rooms.entry(room).or_default().insert(connection);
        true
    }

    pub fn is_member(&self, connection: ConnectionId, room: &RoomName) -> bool {
        self.rooms
            .get(room)
            .map(|members| members.contains(&connection))
            .unwrap_or(false)
    }

    pub fn members(&self, room: &RoomName) -> HashSet<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.clone())
            .unwrap_or_default()
    }

    pub fn rooms_of(&self, connection: ConnectionId) -> HashSet<RoomName> {
        self.memberships
            .get(&connection)
            .map(|rooms| rooms.clone())
            .unwrap_or_default()
    }

    /// Send `frame` to every member of `room`. Returns the number of deliveries.
    pub fn emit(&self, room: &RoomName, frame: &str) -> usize {
        self.fan_out(room, frame, None)
    }

    /// Like [`emit`](Self::emit) but skips `except`
    pub fn emit_except(&self, room: &RoomName, except: ConnectionId, frame: &str) -> usize {
        self.fan_out(room, frame, Some(except))
    }

    fn fan_out(&self, room: &RoomName, frame: &str, except: Option<ConnectionId>) -> usize {
        let targets: Vec<ConnectionId> = self.members(room).into_iter().collect();
        let mut delivered = 0;
        for connection in targets {
            if Some(connection) == except {
                continue;
            }
            let Some(sender) = self.senders.get(&connection).map(|s| s.clone()) else {
                continue;
            };
            if sender.send(frame.to_owned()).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!(connection_id = %connection, room = %room, "dropping frame for closed connection");
            }
        }
        delivered
    }

    /// Forget the connection and every membership it held
    pub fn remove_connection(&self, connection: ConnectionId) {
        self.senders.remove(&connection);
        let Some((_, joined)) = self.memberships.remove(&connection) else {
            return;
        };
        for room in joined {
            if let Entry::Occupied(mut entry) = self.rooms.entry(room) {
                entry.get_mut().remove(&connection);
                if entry.get().is_empty() {
                    entry.remove();
                }
            }
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn conversation_room_is_order_independent() {
        assert_eq!(
            RoomName::conversation(UserId(10), UserId(9)),
            RoomName::conversation(UserId(9), UserId(10))
        );
        assert_eq!(RoomName::conversation(UserId(10), UserId(9)).as_str(), "chat-9-10");
        assert_eq!(RoomName::mailbox(UserId(4)).to_string(), "user-4");
    }

    #[test]
    fn join_is_idempotent() {
        let router = RoomRouter::new();
        let (tx, _rx) = unbounded_channel();
        let c = ConnectionId::new();
        router.register(c, tx);
        let room = RoomName::conversation(UserId(1), UserId(2));
        assert!(router.join(c, room.clone()));
        assert!(!router.join(c, room.clone()));
        assert_eq!(router.members(&room).len(), 1);
    }

    #[test]
    fn unregistered_connection_cannot_join() {
        let router = RoomRouter::new();
        assert!(!router.join(ConnectionId::new(), RoomName::mailbox(UserId(1))));
        assert_eq!(router.room_count(), 0);
    }

    #[test]
    fn emit_except_skips_origin() {
        let router = RoomRouter::new();
        let (tx1, mut rx1) = unbounded_channel();
        let (tx2, mut rx2) = unbounded_channel();
        let (c1, c2) = (ConnectionId::new(), ConnectionId::new());
        router.register(c1, tx1);
        router.register(c2, tx2);
        let room = RoomName::mailbox(UserId(1));
        router.join(c1, room.clone());
        router.join(c2, room.clone());

        assert_eq!(router.emit_except(&room, c1, "hello"), 1);
        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap(), "hello");

        assert_eq!(router.emit(&room, "all"), 2);
        assert_eq!(rx1.try_recv().unwrap(), "all");
    }

    #[test]
    fn removal_drops_empty_rooms() {
        let router = RoomRouter::new();
        let (tx, _rx) = unbounded_channel();
        let c = ConnectionId::new();
        router.register(c, tx);
        router.join(c, RoomName::mailbox(UserId(1)));
        router.join(c, RoomName::conversation(UserId(1), UserId(2)));

        router.remove_connection(c);
        assert_eq!(router.room_count(), 0);
        assert!(router.rooms_of(c).is_empty());
        assert!(!router.join(c, RoomName::mailbox(UserId(1))));
    }
}
