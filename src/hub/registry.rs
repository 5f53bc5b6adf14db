use std::collections::{HashMap, HashSet};

use time::OffsetDateTime;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::hub::envelope::{Role, ServerEvent};

/// Opaque handle for one live socket, minted at accept time by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Join-time identity of an admitted connection. One record per live,
/// admitted connection; the room is fixed for the life of the connection.
#[derive(Clone, Debug)]
pub struct PresenceRecord {
    pub display_name: String,
    pub role: Role,
    pub room_id: String,
    pub joined_at: OffsetDateTime,
}

/// Delivery channel back to one connection's forwarder task.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

struct Member {
    record: PresenceRecord,
    sender: EventSender,
}

/// Authoritative connection table plus the derived per-room name index.
///
/// The index exists only to answer the admission check; it is mutated in the
/// same method call as the table so the two cannot diverge. Owned by the hub
/// task, so no locking happens here.
#[derive(Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Member>,
    room_names: HashMap<String, HashSet<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Is `display_name` already held by a live member of `room_id`?
    pub fn name_taken(&self, room_id: &str, display_name: &str) -> bool {
        self.room_names
            .get(room_id)
            .is_some_and(|names| names.contains(display_name))
    }

    /// Register an admitted connection: table entry and index entry as one
    /// step. The caller must have checked admission first.
    pub fn insert(&mut self, conn: ConnectionId, sender: EventSender, record: PresenceRecord) {
        let fresh = self
            .room_names
            .entry(record.room_id.clone())
            .or_default()
            .insert(record.display_name.clone());
        debug_assert!(fresh, "admission must run before insert");
        self.connections.insert(conn, Member { record, sender });
    }

    /// Unregister a connection, returning its record if it was admitted.
    /// Drops the room's index set once the last member leaves.
    pub fn remove(&mut self, conn: ConnectionId) -> Option<PresenceRecord> {
        let Member { record, .. } = self.connections.remove(&conn)?;
        if let Some(names) = self.room_names.get_mut(&record.room_id) {
            names.remove(&record.display_name);
            if names.is_empty() {
                self.room_names.remove(&record.room_id);
            }
        }
        Some(record)
    }

    pub fn get(&self, conn: ConnectionId) -> Option<&PresenceRecord> {
        self.connections.get(&conn).map(|m| &m.record)
    }

    /// Snapshot of the delivery channels for every member of `room_id`.
    pub fn room_senders(&self, room_id: &str) -> Vec<(ConnectionId, EventSender)> {
        self.connections
            .iter()
            .filter(|(_, m)| m.record.room_id == room_id)
            .map(|(conn, m)| (*conn, m.sender.clone()))
            .collect()
    }

    /// Snapshot of the presence records for every member of `room_id`.
    pub fn room_presence(&self, room_id: &str) -> Vec<PresenceRecord> {
        self.connections
            .values()
            .filter(|m| m.record.room_id == room_id)
            .map(|m| m.record.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, room: &str) -> PresenceRecord {
        PresenceRecord {
            display_name: name.to_owned(),
            role: Role::Student,
            room_id: room.to_owned(),
            joined_at: OffsetDateTime::now_utc(),
        }
    }

    fn sender() -> EventSender {
        mpsc::unbounded_channel().0
    }

    #[test]
    fn insert_marks_name_taken_only_in_that_room() {
        let mut reg = Registry::new();
        reg.insert(ConnectionId::new(), sender(), record("alice", "math-101"));

        assert!(reg.name_taken("math-101", "alice"));
        assert!(!reg.name_taken("math-101", "bob"));
        assert!(!reg.name_taken("math-102", "alice"));
    }

    #[test]
    fn remove_frees_the_name_and_returns_the_record() {
        let mut reg = Registry::new();
        let conn = ConnectionId::new();
        reg.insert(conn, sender(), record("alice", "math-101"));

        let removed = reg.remove(conn).unwrap();
        assert_eq!(removed.display_name, "alice");
        assert!(!reg.name_taken("math-101", "alice"));
        assert!(reg.get(conn).is_none());
    }

    #[test]
    fn remove_of_unknown_connection_is_none() {
        let mut reg = Registry::new();
        assert!(reg.remove(ConnectionId::new()).is_none());
    }

    #[test]
    fn same_name_in_two_rooms_is_tracked_independently() {
        let mut reg = Registry::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        reg.insert(a, sender(), record("sam", "math-101"));
        reg.insert(b, sender(), record("sam", "math-102"));

        reg.remove(a);
        assert!(!reg.name_taken("math-101", "sam"));
        assert!(reg.name_taken("math-102", "sam"));
    }

    #[test]
    fn room_snapshots_are_scoped() {
        let mut reg = Registry::new();
        reg.insert(ConnectionId::new(), sender(), record("alice", "math-101"));
        reg.insert(ConnectionId::new(), sender(), record("bob", "math-101"));
        reg.insert(ConnectionId::new(), sender(), record("carol", "math-102"));

        assert_eq!(reg.room_senders("math-101").len(), 2);
        assert_eq!(reg.room_presence("math-102").len(), 1);
        assert!(reg.room_senders("history-9").is_empty());
    }
}
