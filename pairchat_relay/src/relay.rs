// Addressed forwarding of chat and signaling envelopes.
//
// The sender names the destination; the relay checks only that the
// destination is connected. Signals and chats are delivered as distinct
// message kinds so a client never feeds chat text into its peer connection.
//
// A miss is handled differently per kind. A signal that can't be delivered
// bounces a `peer-disconnected` back to the sender, whose connection attempt
// would otherwise hang. A chat that can't be delivered is dropped.

use pairchat_protocol::{EndpointId, ServerMessage};
use tracing::debug;

use crate::registry::ConnectionRegistry;

/// Body of one relayed envelope.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Signal(serde_json::Value),
    Chat(String),
}

/// What `forward` did with an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Forwarded {
    /// One message went to the destination.
    Delivered,
    /// Destination unreachable; the sender was told.
    BouncedToSender,
    /// Destination unreachable; nobody was told.
    Dropped,
}

/// Forward `payload` from `from` to `to`. `to` is `None` when the sender
/// named no destination, which counts as unreachable.
pub fn forward(
    registry: &ConnectionRegistry,
    from: EndpointId,
    to: Option<EndpointId>,
    payload: Payload,
) -> Forwarded {
    let destination = to.filter(|&id| registry.is_active(id));

    match (destination, payload) {
        (Some(to), Payload::Signal(signal)) => {
            registry.send_to(to, ServerMessage::PeerSignal { from, signal });
            Forwarded::Delivered
        }
        (Some(to), Payload::Chat(message)) => {
            registry.send_to(to, ServerMessage::ChatMessage { from, message });
            Forwarded::Delivered
        }
        (None, Payload::Signal(_)) => {
            debug!(%from, ?to, "signal destination unreachable");
            registry.send_to(from, ServerMessage::PeerDisconnected { id: to });
            Forwarded::BouncedToSender
        }
        (None, Payload::Chat(_)) => {
            debug!(%from, ?to, "chat destination unreachable, dropped");
            Forwarded::Dropped
        }
    }
}
