use crate::hub::registry::Registry;

pub const NAME_TAKEN: &str = "name already taken in this room";

/// Outcome of a join request. On `Rejected` the hub sends `join_rejected`
/// and closes the connection; nothing was registered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Rejected { reason: String },
}

/// Per-room uniqueness policy. No side effects; the hub task performs the
/// registry write in the same serial step, so check-then-act cannot race.
/// Name and room arrive as-is: format validation belongs upstream, and the
/// same name is fine in two different rooms.
pub fn try_admit(registry: &Registry, room_id: &str, display_name: &str) -> Admission {
    if registry.name_taken(room_id, display_name) {
        Admission::Rejected { reason: NAME_TAKEN.to_owned() }
    } else {
        Admission::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::envelope::Role;
    use crate::hub::registry::{ConnectionId, PresenceRecord};
    use time::OffsetDateTime;
    use tokio::sync::mpsc;

    fn occupied(room: &str, name: &str) -> Registry {
        let mut reg = Registry::new();
        reg.insert(
            ConnectionId::new(),
            mpsc::unbounded_channel().0,
            PresenceRecord {
                display_name: name.to_owned(),
                role: Role::Student,
                room_id: room.to_owned(),
                joined_at: OffsetDateTime::now_utc(),
            },
        );
        reg
    }

    #[test]
    fn free_name_is_accepted() {
        let reg = occupied("math-101", "alice");
        assert_eq!(try_admit(&reg, "math-101", "bob"), Admission::Accepted);
    }

    #[test]
    fn held_name_is_rejected_with_reason() {
        let reg = occupied("math-101", "alice");
        match try_admit(&reg, "math-101", "alice") {
            Admission::Rejected { reason } => assert_eq!(reason, NAME_TAKEN),
            Admission::Accepted => panic!("duplicate name admitted"),
        }
    }

    #[test]
    fn uniqueness_is_per_room() {
        let reg = occupied("math-101", "alice");
        assert_eq!(try_admit(&reg, "math-102", "alice"), Admission::Accepted);
    }
}
