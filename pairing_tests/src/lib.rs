// Test-only chat client for end-to-end pairing tests.
//
// Wraps the real `NetClient` (from `pairchat_relay::client`) with blocking,
// assertion-friendly helpers. All networking goes through the same code path
// a real client would use; the only test-specific code here is waiting with a
// timeout and panicking with a useful message when the expected thing does
// not arrive.
//
// See also: `tests/pairing_scenarios.rs`.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use pairchat_protocol::{EndpointId, ServerMessage};
use pairchat_relay::client::NetClient;

/// Default timeout for blocking waits.
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `expect_silence` listens before concluding nothing is coming.
const SILENCE_WINDOW: Duration = Duration::from_millis(150);

/// A test chat client wrapping a real `NetClient`.
pub struct TestChatClient {
    pub name: &'static str,
    client: NetClient,
}

impl TestChatClient {
    /// Connect to a relay and wait for `welcome`.
    pub fn connect(addr: SocketAddr, name: &'static str) -> Self {
        let client = NetClient::connect(addr)
            .unwrap_or_else(|e| panic!("{name}: connect failed: {e}"));
        Self { name, client }
    }

    pub fn id(&self) -> EndpointId {
        self.client.id()
    }

    pub fn partner(&self) -> Option<EndpointId> {
        self.client.partner()
    }

    pub fn join_queue(&mut self) {
        self.client.join_queue().expect("join_queue failed");
    }

    pub fn chat(&mut self, message: &str) {
        self.client.chat_partner(message).expect("chat failed");
    }

    pub fn chat_to(&mut self, to: EndpointId, message: &str) {
        self.client.send_chat(Some(to), message).expect("chat failed");
    }

    pub fn signal(&mut self, signal: serde_json::Value) {
        self.client.signal_partner(signal).expect("signal failed");
    }

    pub fn signal_to(&mut self, to: EndpointId, signal: serde_json::Value) {
        self.client
            .send_signal(Some(to), signal)
            .expect("signal failed");
    }

    /// Send `goodbye` and drop the connection.
    pub fn leave(mut self) {
        self.client.disconnect();
    }

    /// Block until the next message arrives.
    pub fn next(&mut self) -> ServerMessage {
        self.client
            .recv_timeout(WAIT_TIMEOUT)
            .unwrap_or_else(|| panic!("{}: timed out waiting for a message", self.name))
    }

    /// Block until `user-matched` arrives, skipping anything else. Returns
    /// the partner id.
    pub fn expect_matched(&mut self) -> EndpointId {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            if let Some(ServerMessage::UserMatched { partner }) = self.client.recv_timeout(remaining)
            {
                return partner;
            }
        }
        panic!("{}: timed out waiting for user-matched", self.name);
    }

    /// Assert that nothing arrives within a short window.
    pub fn expect_silence(&mut self) {
        if let Some(msg) = self.client.recv_timeout(SILENCE_WINDOW) {
            panic!("{}: expected silence, got {msg:?}", self.name);
        }
    }
}
