// Blocking TCP client for the relay.
//
// Architecture mirrors the server side:
// - `connect()` opens the socket and waits for `welcome` on the calling
//   thread, then spawns a background reader thread.
// - The reader thread decodes `ServerMessage` frames into an `mpsc` channel.
// - `poll()` drains the channel without blocking; `recv_timeout()` waits for
//   one message.
//
// The client keeps track of its own partner the way a browser client does:
// `user-matched` sets it, a `peer-disconnected` naming it clears it. The
// `*_partner` helpers address whoever that currently is; the relay itself
// keeps no say in who a client talks to.

use std::io::{self, BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pairchat_protocol::framing::{read_json, write_json};
use pairchat_protocol::{ClientMessage, EndpointId, ServerMessage};
use thiserror::Error;

/// How long `connect` waits for `welcome`.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),

    #[error("relay I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("expected welcome, got {0:?}")]
    UnexpectedHandshake(ServerMessage),
}

/// TCP client for relay communication.
pub struct NetClient {
    writer: BufWriter<TcpStream>,
    inbox: Receiver<ServerMessage>,
    _reader_thread: Option<JoinHandle<()>>,
    id: EndpointId,
    partner: Option<EndpointId>,
}

impl NetClient {
    /// Connect to a relay, wait for `welcome`, and start the reader thread.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).map_err(ClientError::Connect)?;
        stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;

        let mut reader = BufReader::new(stream.try_clone()?);
        let id = match read_json::<_, ServerMessage>(&mut reader)? {
            ServerMessage::Welcome { id } => id,
            other => return Err(ClientError::UnexpectedHandshake(other)),
        };

        // Long-lived reader blocks indefinitely.
        stream.set_read_timeout(None)?;

        let (tx, rx) = mpsc::channel();
        let reader_thread = thread::spawn(move || reader_loop(reader, tx));

        Ok(Self {
            writer: BufWriter::new(stream),
            inbox: rx,
            _reader_thread: Some(reader_thread),
            id,
            partner: None,
        })
    }

    /// The id the relay assigned to this connection.
    pub fn id(&self) -> EndpointId {
        self.id
    }

    /// Current partner as last reported by the relay.
    pub fn partner(&self) -> Option<EndpointId> {
        self.partner
    }

    /// Ask to be matched. Any current partner is forgotten.
    pub fn join_queue(&mut self) -> Result<(), ClientError> {
        self.partner = None;
        self.send(&ClientMessage::QueueJoin)
    }

    pub fn send_chat(&mut self, to: Option<EndpointId>, message: &str) -> Result<(), ClientError> {
        self.send(&ClientMessage::ChatMessage {
            to,
            message: message.into(),
        })
    }

    pub fn send_signal(
        &mut self,
        to: Option<EndpointId>,
        signal: serde_json::Value,
    ) -> Result<(), ClientError> {
        self.send(&ClientMessage::PeerSignal { to, signal })
    }

    /// Chat with the current partner (or with nobody, which the relay drops).
    pub fn chat_partner(&mut self, message: &str) -> Result<(), ClientError> {
        self.send_chat(self.partner, message)
    }

    /// Signal the current partner.
    pub fn signal_partner(&mut self, signal: serde_json::Value) -> Result<(), ClientError> {
        self.send_signal(self.partner, signal)
    }

    /// Send `goodbye`; the relay closes the connection.
    pub fn disconnect(&mut self) {
        let _ = self.send(&ClientMessage::Goodbye);
    }

    /// Drain all queued server messages (non-blocking).
    pub fn poll(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.inbox.try_recv() {
            self.observe(&msg);
            messages.push(msg);
        }
        messages
    }

    /// Wait up to `timeout` for the next server message. `None` on timeout
    /// or once the connection is closed.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<ServerMessage> {
        match self.inbox.recv_timeout(timeout) {
            Ok(msg) => {
                self.observe(&msg);
                Some(msg)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    fn observe(&mut self, msg: &ServerMessage) {
        match msg {
            ServerMessage::UserMatched { partner } => self.partner = Some(*partner),
            ServerMessage::PeerDisconnected { id: Some(id) } if self.partner == Some(*id) => {
                self.partner = None;
            }
            _ => {}
        }
    }

    fn send(&mut self, msg: &ClientMessage) -> Result<(), ClientError> {
        write_json(&mut self.writer, msg)?;
        Ok(())
    }
}

/// Reader thread: read framed messages in a loop, push to channel.
fn reader_loop(mut reader: BufReader<TcpStream>, tx: mpsc::Sender<ServerMessage>) {
    while let Ok(msg) = read_json::<_, ServerMessage>(&mut reader) {
        if tx.send(msg).is_err() {
            break; // Owner dropped the client
        }
    }
}
