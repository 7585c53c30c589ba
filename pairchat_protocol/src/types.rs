// Endpoint identifiers.
//
// The relay assigns every connection a random `EndpointId` when it accepts
// the socket. Clients learn their own id from `welcome` and their partner's
// id from `user-matched`, then name the partner as the destination of every
// chat and signal. Ids are random rather than sequential so a client cannot
// guess the address of a stranger it was never matched with.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for one client connection. Stable for the lifetime of
/// the connection, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointId(pub Uuid);

impl EndpointId {
    /// Generate a fresh random id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
