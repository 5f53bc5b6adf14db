use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::hub::admission::{self, Admission};
use crate::hub::envelope::{Role, ServerEvent, unix_millis};
use crate::hub::registry::{ConnectionId, EventSender, PresenceRecord, Registry};

/// Mutations and queries accepted by the hub task. Connection handlers never
/// touch the registry directly; everything is serialized through this queue,
/// which is what makes check-then-act on a join a single step.
pub enum HubCommand {
    Join {
        conn: ConnectionId,
        sender: EventSender,
        display_name: String,
        role: Role,
        room_id: String,
        reply: oneshot::Sender<Admission>,
    },
    Message {
        conn: ConnectionId,
        text: String,
    },
    Leave {
        conn: ConnectionId,
    },
    Presence {
        room_id: String,
        reply: oneshot::Sender<Vec<PresenceRecord>>,
    },
}

/// Clonable front door to the hub task.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Spawn the hub task; the returned handle is the only way to reach it.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx));
        Self { tx }
    }

    /// Ask for admission to `room_id` under `display_name`. On `Accepted`
    /// the connection is already registered and the room (sender included)
    /// has been told. Errors only if the hub task itself is gone.
    pub async fn join(
        &self,
        conn: ConnectionId,
        sender: EventSender,
        display_name: String,
        role: Role,
        room_id: String,
    ) -> anyhow::Result<Admission> {
        let (reply, decision) = oneshot::channel();
        self.tx
            .send(HubCommand::Join { conn, sender, display_name, role, room_id, reply })
            .map_err(|_| anyhow::anyhow!("hub task is gone"))?;
        Ok(decision.await?)
    }

    /// Relay chat text from an admitted connection. Fire-and-forget.
    pub fn message(&self, conn: ConnectionId, text: String) {
        let _ = self.tx.send(HubCommand::Message { conn, text });
    }

    /// Tear down a connection's membership. Fire-and-forget; a connection
    /// that never joined is a no-op on the hub side.
    pub fn leave(&self, conn: ConnectionId) {
        let _ = self.tx.send(HubCommand::Leave { conn });
    }

    /// Snapshot of who is currently in `room_id`.
    pub async fn presence(&self, room_id: String) -> anyhow::Result<Vec<PresenceRecord>> {
        let (reply, snapshot) = oneshot::channel();
        self.tx
            .send(HubCommand::Presence { room_id, reply })
            .map_err(|_| anyhow::anyhow!("hub task is gone"))?;
        Ok(snapshot.await?)
    }
}

struct Hub {
    registry: Registry,
    last_event_id: u64,
}

/// Single-writer loop. Owns the registry and the event-id counter; runs for
/// the life of the process.
async fn run(mut rx: mpsc::UnboundedReceiver<HubCommand>) {
    let mut hub = Hub { registry: Registry::new(), last_event_id: 0 };
    while let Some(cmd) = rx.recv().await {
        hub.handle(cmd);
    }
}

impl Hub {
    fn handle(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Join { conn, sender, display_name, role, room_id, reply } => {
                self.join(conn, sender, display_name, role, room_id, reply);
            }
            HubCommand::Message { conn, text } => self.message(conn, text),
            HubCommand::Leave { conn } => self.leave(conn),
            HubCommand::Presence { room_id, reply } => {
                let _ = reply.send(self.registry.room_presence(&room_id));
            }
        }
    }

    fn join(
        &mut self,
        conn: ConnectionId,
        sender: EventSender,
        display_name: String,
        role: Role,
        room_id: String,
        reply: oneshot::Sender<Admission>,
    ) {
        let decision = admission::try_admit(&self.registry, &room_id, &display_name);
        if decision == Admission::Accepted {
            let joined_at = OffsetDateTime::now_utc();
            self.registry.insert(
                conn,
                sender,
                PresenceRecord {
                    display_name: display_name.clone(),
                    role,
                    room_id: room_id.clone(),
                    joined_at,
                },
            );
            info!(%conn, room = %room_id, name = %display_name, "joined");
            let event = ServerEvent::UserJoined {
                id: self.next_event_id(),
                display_name,
                role,
                room_id: room_id.clone(),
                timestamp: unix_millis(joined_at),
            };
            self.broadcast(&room_id, event, None);
        } else {
            info!(%conn, room = %room_id, name = %display_name, "join rejected");
        }
        let _ = reply.send(decision);
    }

    fn message(&mut self, conn: ConnectionId, text: String) {
        // Reachable only if a handler sends after its own leave; a bug.
        let Some(record) = self.registry.get(conn) else {
            error!(%conn, "message from a connection with no presence record, dropping");
            return;
        };
        let (display_name, role, room_id) =
            (record.display_name.clone(), record.role, record.room_id.clone());
        let event = ServerEvent::Message {
            id: self.next_event_id(),
            display_name,
            role,
            room_id: room_id.clone(),
            text,
            timestamp: unix_millis(OffsetDateTime::now_utc()),
        };
        self.broadcast(&room_id, event, None);
    }

    fn leave(&mut self, conn: ConnectionId) {
        // None means the connection was never admitted: nothing to announce.
        let Some(record) = self.registry.remove(conn) else {
            return;
        };
        info!(%conn, room = %record.room_id, name = %record.display_name, "left");
        let event = ServerEvent::UserLeft {
            id: self.next_event_id(),
            display_name: record.display_name,
            role: record.role,
            room_id: record.room_id.clone(),
            timestamp: unix_millis(OffsetDateTime::now_utc()),
        };
        self.broadcast(&record.room_id, event, None);
    }

    /// Pre-incremented, process-lifetime, shared by all rooms.
    fn next_event_id(&mut self) -> u64 {
        self.last_event_id += 1;
        self.last_event_id
    }

    /// Fan out to a snapshot of the room's members. A member whose receiver
    /// is already gone is logged and skipped; no retry, no queueing. Sends
    /// are unbounded so one stalled socket never holds up the loop.
    fn broadcast(&self, room_id: &str, event: ServerEvent, exclude: Option<ConnectionId>) {
        for (conn, sender) in self.registry.room_senders(room_id) {
            if Some(conn) == exclude {
                continue;
            }
            if sender.send(event.clone()).is_err() {
                warn!(%conn, room = %room_id, "delivery failed, receiver gone");
            }
        }
    }
}
