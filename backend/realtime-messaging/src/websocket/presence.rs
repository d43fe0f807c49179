use crate::models::{ConnectionId, UserId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;

/// Which users have at least one live connection on this instance.
///
/// Owned by the gateway. A user is present exactly while their connection set is
/// non-empty; empty sets are never stored.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    users: DashMap<UserId, HashSet<ConnectionId>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: registering the same connection twice is a no-op
    pub fn on_connect(&self, user: UserId, connection: ConnectionId) {
        self.users.entry(user).or_default().insert(connection);
    }

    /// Returns true when this was the user's last connection
    pub fn on_disconnect(&self, user: UserId, connection: ConnectionId) -> bool {
        match self.users.entry(user) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().remove(&connection);
                if entry.get().is_empty() {
                    entry.remove();
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Point-in-time snapshot; no lock outlives the call
    pub fn online_users(&self) -> HashSet<UserId> {
        self.users.iter().map(|e| *e.key()).collect()
    }

    pub fn is_online(&self, user: UserId) -> bool {
        self.users.contains_key(&user)
    }

    pub fn connection_count(&self, user: UserId) -> usize {
        self.users.get(&user).map(|set| set.len()).unwrap_or(0)
    }

    pub fn online_count(&self) -> usize {
        self.users.len()
    }
}
