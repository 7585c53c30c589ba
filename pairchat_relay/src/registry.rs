// Connection registry: which endpoints are connected and how to reach them.
//
// Each registered endpoint owns the sending half of a bounded channel. The
// other half is drained by that connection's writer thread (see `server.rs`).
// Sends never block: once a client stops reading and its outbox fills up,
// further messages to it are dropped. Dropping an entry drops its sender,
// which ends the writer thread and closes the socket.
//
// Only the coordinator mutates the registry. Every relay and matchmaking
// decision goes through `is_active`.

use std::collections::BTreeMap;
use std::sync::mpsc::{SyncSender, TrySendError};

use pairchat_protocol::{EndpointId, ServerMessage};
use tracing::{debug, warn};

/// Messages that may wait for one client's writer before sends to it are
/// dropped.
pub const OUTBOX_CAPACITY: usize = 256;

/// Write handle for one connected client.
pub type Outbox = SyncSender<ServerMessage>;

/// Set of currently connected endpoints, keyed by id.
#[derive(Default)]
pub struct ConnectionRegistry {
    endpoints: BTreeMap<EndpointId, Outbox>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an endpoint. Returns `false` (and keeps the existing outbox) if the
    /// id is already registered.
    pub fn register(&mut self, id: EndpointId, outbox: Outbox) -> bool {
        if self.endpoints.contains_key(&id) {
            return false;
        }
        self.endpoints.insert(id, outbox);
        true
    }

    /// Remove an endpoint. Returns `false` if it was not registered.
    pub fn unregister(&mut self, id: EndpointId) -> bool {
        self.endpoints.remove(&id).is_some()
    }

    pub fn is_active(&self, id: EndpointId) -> bool {
        self.endpoints.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = EndpointId> + '_ {
        self.endpoints.keys().copied()
    }

    /// Queue `msg` for delivery to `id` only. Returns `false` if the id is not
    /// registered, its outbox is full, or its writer has already gone away.
    pub fn send_to(&self, id: EndpointId, msg: ServerMessage) -> bool {
        let Some(outbox) = self.endpoints.get(&id) else {
            return false;
        };
        deliver(id, outbox, msg)
    }

    /// Send `msg` to every endpoint except `except`. Returns how many
    /// endpoints it was queued for.
    pub fn broadcast_except(&self, except: EndpointId, msg: &ServerMessage) -> usize {
        let mut sent = 0;
        for (&id, outbox) in &self.endpoints {
            if id == except {
                continue;
            }
            if deliver(id, outbox, msg.clone()) {
                sent += 1;
            }
        }
        sent
    }
}

fn deliver(id: EndpointId, outbox: &Outbox, msg: ServerMessage) -> bool {
    match outbox.try_send(msg) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(%id, "outbox full, message discarded");
            false
        }
        Err(TrySendError::Disconnected(_)) => {
            // Writer thread exited; the reader will report the disconnect.
            debug!(%id, "outbox closed, message discarded");
            false
        }
    }
}
