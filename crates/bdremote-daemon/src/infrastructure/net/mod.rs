//! TCP acceptor for broadcast listeners.
//!
//! The daemon binds a TCP socket on the configured port (default 8888) and
//! adds every accepted connection to the shared listener registry. Listeners
//! never send anything; the channel carries exactly one message type, the
//! broadcast line, from daemon to listener.
//!
//! The acceptor runs as a blocking loop on a dedicated thread. The listening
//! socket is non-blocking so the loop can poll the shutdown token between
//! accept attempts; an accepted stream is switched back to blocking mode
//! before it joins the registry, because broadcast writes are plain
//! synchronous writes.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::manage_listeners::{ListenerSink, SharedListenerRegistry};
use crate::shutdown::ShutdownSignal;

/// Pause between accept attempts while the socket has nothing pending.
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Error type for the acceptor.
#[derive(Debug, Error)]
pub enum NetError {
    /// The listening socket could not be bound.
    #[error("failed to bind listener socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// The bind address in the configuration could not be parsed.
    #[error("invalid bind address '{0}'")]
    BadBindAddress(String),
}

/// A connected listener backed by a TCP stream.
pub struct TcpListenerSink {
    id: Uuid,
    peer: SocketAddr,
    stream: TcpStream,
}

impl TcpListenerSink {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            stream,
        }
    }
}

impl ListenerSink for TcpListenerSink {
    fn id(&self) -> Uuid {
        self.id
    }

    fn send(&mut self, line: &[u8]) -> io::Result<usize> {
        // One write attempt; the registry treats a short write as a failed
        // delivery and prunes this listener.
        self.stream.write(line)
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}

/// Binds the listener socket and spawns the accept loop on its own thread.
///
/// # Errors
///
/// Returns [`NetError::BadBindAddress`] for an unparseable address and
/// [`NetError::BindFailed`] when the socket cannot be bound.
pub fn start_listener_acceptor(
    bind_address: &str,
    port: u16,
    registry: SharedListenerRegistry,
    shutdown: ShutdownSignal,
) -> Result<JoinHandle<()>, NetError> {
    let addr: SocketAddr = format!("{bind_address}:{port}")
        .parse()
        .map_err(|_| NetError::BadBindAddress(bind_address.to_string()))?;

    let listener = TcpListener::bind(addr).map_err(|source| NetError::BindFailed { addr, source })?;
    listener
        .set_nonblocking(true)
        .map_err(|source| NetError::BindFailed { addr, source })?;

    info!("listener acceptor bound on {addr}");

    let handle = thread::Builder::new()
        .name("bdremote-accept".to_string())
        .spawn(move || accept_loop(listener, registry, shutdown))
        .expect("failed to spawn acceptor thread");

    Ok(handle)
}

/// The accept loop executed on the acceptor thread.
fn accept_loop(listener: TcpListener, registry: SharedListenerRegistry, shutdown: ShutdownSignal) {
    while !shutdown.is_cancelled() {
        match listener.accept() {
            Ok((stream, peer)) => register_connection(stream, peer, &registry),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => {
                error!("accept error: {e}");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }

    info!("listener acceptor stopped");
}

/// Wraps an accepted stream and hands it to the registry.
fn register_connection(stream: TcpStream, peer: SocketAddr, registry: &SharedListenerRegistry) {
    if let Err(e) = stream.set_nonblocking(false) {
        warn!("could not restore blocking mode for {peer}: {e}; dropping connection");
        return;
    }

    let sink = TcpListenerSink::new(stream, peer);
    let mut registry = registry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if registry.add(Box::new(sink)) {
        info!("listener connected from {peer} ({} total)", registry.len());
    } else {
        // Registry full; the stream is dropped, closing the connection.
        debug!("connection from {peer} refused");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
