// Protocol messages for client-relay communication.
//
// Two enums define the full protocol vocabulary:
// - `ClientMessage`: sent by clients to the relay.
// - `ServerMessage`: sent by the relay to clients.
//
// Variants serialize with kebab-case names (`queue-join`, `peer-signal`, ...)
// so the JSON on the wire reads the same as the event names browser clients
// already use.
//
// Signal payloads are carried as an opaque `serde_json::Value`. The relay
// routes on `to` only and never looks inside `signal`; offers, answers and
// ICE candidates all pass through untouched. A missing `signal` is relayed
// as `null`.
//
// Destinations decode leniently: a `to` that isn't an id this relay could
// have issued reads as `None`, the same as an absent one. Such a request is
// still routed, and a signal to it still bounces.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::EndpointId;

/// Messages sent by a client to the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Ask to be paired with the next waiting stranger.
    QueueJoin,
    /// Text chat for the client's current partner. `to` is absent when the
    /// client has no partner; the relay treats that as an unreachable
    /// destination.
    ChatMessage {
        #[serde(default, deserialize_with = "lenient_destination")]
        to: Option<EndpointId>,
        message: String,
    },
    /// Connection-negotiation blob for the client's current partner.
    PeerSignal {
        #[serde(default, deserialize_with = "lenient_destination")]
        to: Option<EndpointId>,
        #[serde(default)]
        signal: serde_json::Value,
    },
    /// Client is leaving gracefully.
    Goodbye,
}

fn lenient_destination<'de, D>(deserializer: D) -> Result<Option<EndpointId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| serde_json::from_value(value).ok()))
}

/// Messages sent by the relay to a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServerMessage {
    /// First frame on every connection: the id the relay assigned.
    Welcome { id: EndpointId },
    /// You have been paired; `partner` is the id to address from now on.
    UserMatched { partner: EndpointId },
    /// Chat relayed from another endpoint.
    ChatMessage { from: EndpointId, message: String },
    /// Signal relayed from another endpoint.
    PeerSignal {
        from: EndpointId,
        signal: serde_json::Value,
    },
    /// An endpoint went away. `None` when a signal named no destination at
    /// all.
    PeerDisconnected { id: Option<EndpointId> },
}
