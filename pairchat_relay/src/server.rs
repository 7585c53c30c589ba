// TCP server and event loop for the relay.
//
// Architecture: thread-per-connection I/O around one coordinator thread.
//
// - **Listener thread**: non-blocking `accept()` loop; posts
//   `InternalEvent::NewConnection` for every socket.
// - **Reader threads** (one per client): read frames, decode `ClientMessage`,
//   post `MessageFrom`. EOF or a read error posts `Disconnected` and ends the
//   thread; `goodbye` is posted like any other request and ends it too. A
//   frame that doesn't decode is logged and skipped.
// - **Writer threads** (one per client): drain that client's bounded outbox
//   into the socket. They end when the coordinator drops the outbox, and
//   shut the socket down on the way out so the client sees EOF.
// - **Coordinator thread**: owns the `Coordinator` and handles one event at
//   a time. It never touches a socket directly, so a stalled client can't
//   hold up anyone else.
//
// Shutdown: `RelayHandle::stop` clears `keep_running`. The coordinator loop
// notices within `SHUTDOWN_POLL`, drops the `Coordinator` (closing every
// outbox), and exits.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use pairchat_protocol::framing::{read_message, write_json};
use pairchat_protocol::{ClientMessage, EndpointId, ServerMessage};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::coordinator::Coordinator;
use crate::error::RelayError;
use crate::registry::OUTBOX_CAPACITY;

/// How often idle loops re-check the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Back-off for the non-blocking accept loop when nobody is connecting.
const ACCEPT_IDLE: Duration = Duration::from_millis(20);

/// Events sent from listener/reader threads to the coordinator thread.
enum InternalEvent {
    NewConnection {
        stream: TcpStream,
        peer_addr: SocketAddr,
    },
    MessageFrom {
        id: EndpointId,
        message: ClientMessage,
    },
    Disconnected {
        id: EndpointId,
    },
}

/// Handle returned by `start_relay` to control the running server.
pub struct RelayHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RelayHandle {
    /// Signal the relay to stop and wait for it to shut down.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        self.join();
    }

    /// Block until the relay exits on its own.
    pub fn wait(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Start the relay on a background thread. Returns a handle for stopping it
/// and the bound address (useful with port 0).
pub fn start_relay(config: RelayConfig) -> Result<(RelayHandle, SocketAddr), RelayError> {
    let addr = config.listen_address();
    let listener = TcpListener::bind(&addr).map_err(|source| RelayError::Bind {
        addr: addr.clone(),
        source,
    })?;
    let local_addr = listener.local_addr()?;
    // Non-blocking so the accept thread can check keep_running.
    listener.set_nonblocking(true)?;

    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_clone = keep_running.clone();
    let coordinator = Coordinator::from_config(&config);

    let thread = thread::Builder::new()
        .name("pairchat-coordinator".into())
        .spawn(move || run_relay(listener, coordinator, keep_running_clone))?;

    info!(addr = %local_addr, "relay listening");

    Ok((
        RelayHandle {
            keep_running,
            thread: Some(thread),
        },
        local_addr,
    ))
}

/// Coordinator loop. Runs until `keep_running` is cleared.
fn run_relay(listener: TcpListener, mut coordinator: Coordinator, keep_running: Arc<AtomicBool>) {
    let (tx, rx): (Sender<InternalEvent>, Receiver<InternalEvent>) = mpsc::channel();

    let keep_running_listener = keep_running.clone();
    let tx_listener = tx.clone();
    thread::spawn(move || accept_loop(listener, tx_listener, keep_running_listener));

    while keep_running.load(Ordering::SeqCst) {
        match rx.recv_timeout(SHUTDOWN_POLL) {
            Ok(event) => handle_event(&mut coordinator, event, &tx),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(
        connections = coordinator.connection_count(),
        "relay shutting down"
    );
}

fn accept_loop(listener: TcpListener, tx: Sender<InternalEvent>, keep_running: Arc<AtomicBool>) {
    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer_addr)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                if tx.send(InternalEvent::NewConnection { stream, peer_addr }).is_err() {
                    break;
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_IDLE);
            }
            Err(e) => {
                warn!(error = %e, "accept failed, listener stopping");
                break;
            }
        }
    }
}

/// Dispatch a single event to the coordinator.
fn handle_event(coordinator: &mut Coordinator, event: InternalEvent, tx: &Sender<InternalEvent>) {
    match event {
        InternalEvent::NewConnection { stream, peer_addr } => {
            handle_new_connection(coordinator, stream, peer_addr, tx);
        }
        InternalEvent::MessageFrom { id, message } => {
            handle_message(coordinator, id, message);
        }
        InternalEvent::Disconnected { id } => {
            coordinator.disconnect(id);
        }
    }
}

/// Wire up a fresh socket: writer thread, registration, reader thread.
fn handle_new_connection(
    coordinator: &mut Coordinator,
    stream: TcpStream,
    peer_addr: SocketAddr,
    tx: &Sender<InternalEvent>,
) {
    let read_half = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!(%peer_addr, error = %e, "could not split connection");
            return;
        }
    };

    let (outbox, outbox_rx) = mpsc::sync_channel(OUTBOX_CAPACITY);
    thread::spawn(move || writer_loop(stream, outbox_rx));

    let id = coordinator.connect(outbox);
    debug!(%id, %peer_addr, "connection accepted");

    let tx_reader = tx.clone();
    thread::spawn(move || reader_loop(BufReader::new(read_half), id, tx_reader));
}

/// Reader loop for a single client.
fn reader_loop(mut reader: BufReader<TcpStream>, id: EndpointId, tx: Sender<InternalEvent>) {
    loop {
        let bytes = match read_message(&mut reader) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(%id, error = %e, "read ended");
                break;
            }
        };
        let message = match serde_json::from_slice::<ClientMessage>(&bytes) {
            Ok(message) => message,
            Err(e) => {
                warn!(%id, error = %e, "malformed frame skipped");
                continue;
            }
        };
        let leaving = message == ClientMessage::Goodbye;
        if tx.send(InternalEvent::MessageFrom { id, message }).is_err() || leaving {
            return;
        }
    }
    let _ = tx.send(InternalEvent::Disconnected { id });
}

/// Writer loop for a single client. Exits when the outbox closes or the
/// socket stops accepting writes.
fn writer_loop(stream: TcpStream, outbox: Receiver<ServerMessage>) {
    let mut writer = BufWriter::new(match stream.try_clone() {
        Ok(s) => s,
        Err(_) => return,
    });
    for msg in outbox {
        if let Err(e) = write_json(&mut writer, &msg) {
            debug!(error = %e, "write failed, dropping connection");
            break;
        }
    }
    let _ = stream.shutdown(Shutdown::Both);
}

/// Route a client request.
fn handle_message(coordinator: &mut Coordinator, id: EndpointId, message: ClientMessage) {
    match message {
        ClientMessage::QueueJoin => {
            coordinator.queue_join(id);
        }
        ClientMessage::ChatMessage { to, message } => {
            coordinator.chat(id, to, message);
        }
        ClientMessage::PeerSignal { to, signal } => {
            coordinator.signal(id, to, signal);
        }
        ClientMessage::Goodbye => {
            coordinator.disconnect(id);
        }
    }
}
