// pairchat_relay — matchmaking and signaling relay for anonymous
// peer-to-peer chat.
//
// The relay pairs waiting clients two at a time and forwards the messages
// they need before a direct peer link exists: connection-negotiation blobs
// and chat text. It never looks inside those payloads and never carries
// media.
//
// Module overview:
// - `registry.rs`:    Connected endpoints and their outboxes.
// - `queue.rs`:       Duplicate-free FIFO of endpoints waiting for a partner.
// - `partners.rs`:    Who is paired with whom, for targeting disconnect
//                     notices.
// - `matchmaker.rs`:  Drains the queue two at a time and announces matches.
// - `relay.rs`:       Addressed forwarding of signals and chat.
// - `coordinator.rs`: Lifecycle controller owning all of the above.
// - `server.rs`:      TCP listener, per-client reader/writer threads, and the
//                     single coordinator thread fed over an `mpsc` channel.
// - `client.rs`:      Blocking client used by tests and tools.
// - `config.rs`:      CLI/environment configuration.
//
// The relay runs as a standalone binary (`main.rs`) or embedded via
// `start_relay`.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod matchmaker;
pub mod partners;
pub mod queue;
pub mod registry;
pub mod relay;
pub mod server;

pub use config::{DisconnectNotice, RelayConfig, SurvivorPolicy};
pub use error::RelayError;
pub use server::{RelayHandle, start_relay};
