// pairchat_protocol — wire protocol for the pairchat matchmaking relay.
//
// Defines the message types and framing shared by the relay
// (`pairchat_relay`) and its clients. No networking lives here.
//
// Module overview:
// - `types.rs`:    `EndpointId`, the opaque per-connection identifier.
// - `message.rs`:  `ClientMessage` / `ServerMessage` enums.
// - `framing.rs`:  4-byte big-endian length prefix, then a JSON document.
//
// Design decisions:
// - **JSON on the wire.** Signal payloads are already JSON in every WebRTC
//   stack, so carrying them as `serde_json::Value` avoids a second encoding.
// - **Blocking `Read`/`Write`.** The relay runs on plain threads; framing
//   works over any stream or buffer.

pub mod framing;
pub mod message;
pub mod types;

pub use framing::{MAX_MESSAGE_SIZE, read_json, read_message, write_json, write_message};
pub use message::{ClientMessage, ServerMessage};
pub use types::EndpointId;
