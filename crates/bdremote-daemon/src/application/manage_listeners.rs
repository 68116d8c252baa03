//! Listener registry and broadcast fanout.
//!
//! The registry is the only piece of state touched from more than one thread:
//! the acceptor adds listeners as they connect, and the worker prunes them
//! when a broadcast write fails. One mutex protects the whole structure and
//! is held for the full duration of every read-iterate-mutate sequence, so a
//! broadcast pass can never observe a torn list and two broadcasts never
//! interleave their writes. Callers must not invoke anything under the lock
//! that could try to reacquire it.
//!
//! Delivery is best-effort: a listener whose write errors or comes up short
//! is dropped on the spot and the line is not retried. A listener that blocks
//! delays the rest of the same pass; known limitation of the single-pass
//! design.

use std::io;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use uuid::Uuid;

/// Upper bound on simultaneously connected listeners.
pub const MAX_CLIENTS: usize = 16;

/// One connected consumer of the broadcast line protocol.
///
/// The production implementation wraps a `TcpStream`; tests use recording
/// sinks. `send` performs a single write attempt and reports how many bytes
/// the transport took; anything less than the full line counts as a failed
/// delivery.
pub trait ListenerSink: Send {
    /// Stable identity of this listener within the registry.
    fn id(&self) -> Uuid;

    /// Writes `line` once, returning the number of bytes accepted.
    fn send(&mut self, line: &[u8]) -> io::Result<usize>;

    /// Human-readable peer label for log lines.
    fn peer(&self) -> String;
}

/// Result of one broadcast pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Listeners that received the complete line.
    pub delivered: usize,
    /// Listeners removed because their write failed or came up short.
    pub dropped: usize,
}

/// Ordered collection of listener handles, bounded by [`MAX_CLIENTS`].
///
/// Share it as a [`SharedListenerRegistry`]; the registry itself has no
/// interior locking.
#[derive(Default)]
pub struct ListenerRegistry {
    sinks: Vec<Box<dyn ListenerSink>>,
}

/// The registry as shared between the acceptor and the worker.
pub type SharedListenerRegistry = Arc<Mutex<ListenerRegistry>>;

/// Creates an empty registry behind its mutex.
pub fn shared_registry() -> SharedListenerRegistry {
    Arc::new(Mutex::new(ListenerRegistry::new()))
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently connected listeners.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Adds a listener, refusing at capacity or on a duplicate id.
    ///
    /// Returns `false` (dropping the sink) when refused; the registry size
    /// never exceeds [`MAX_CLIENTS`].
    pub fn add(&mut self, sink: Box<dyn ListenerSink>) -> bool {
        if self.sinks.len() >= MAX_CLIENTS {
            warn!("listener registry full ({MAX_CLIENTS}); refusing {}", sink.peer());
            return false;
        }
        if self.sinks.iter().any(|s| s.id() == sink.id()) {
            warn!("duplicate listener id {}; refusing", sink.id());
            return false;
        }
        debug!("listener added: {} ({})", sink.peer(), sink.id());
        self.sinks.push(sink);
        true
    }

    /// Removes a listener by id; the explicit-disconnect path.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.sinks.len();
        self.sinks.retain(|s| s.id() != id);
        before != self.sinks.len()
    }

    /// Delivers one formatted line to every listener in order.
    ///
    /// A single `retain_mut` pass writes to each listener exactly once and
    /// removes the ones that fail in place, so a removal can neither skip nor
    /// double-visit a neighbour. Must be called with the registry lock held
    /// for the whole pass.
    pub fn broadcast(&mut self, line: &[u8]) -> BroadcastOutcome {
        let mut delivered = 0;
        let mut dropped = 0;

        self.sinks.retain_mut(|sink| match sink.send(line) {
            Ok(n) if n == line.len() => {
                delivered += 1;
                true
            }
            Ok(n) => {
                warn!(
                    "short write to {} ({n} of {} bytes); dropping listener",
                    sink.peer(),
                    line.len()
                );
                dropped += 1;
                false
            }
            Err(e) => {
                warn!("write to {} failed: {e}; dropping listener", sink.peer());
                dropped += 1;
                false
            }
        });

        BroadcastOutcome { delivered, dropped }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// How a recording sink responds to a send.
    #[derive(Clone, Copy)]
    enum SinkMode {
        Accept,
        ShortWrite,
        Fail,
    }

    /// Test double that records every line it accepts.
    struct RecordingSink {
        id: Uuid,
        mode: SinkMode,
        lines: Arc<StdMutex<Vec<Vec<u8>>>>,
    }

    impl RecordingSink {
        fn new(mode: SinkMode) -> (Self, Arc<StdMutex<Vec<Vec<u8>>>>) {
            let lines = Arc::new(StdMutex::new(Vec::new()));
            (
                Self {
                    id: Uuid::new_v4(),
                    mode,
                    lines: Arc::clone(&lines),
                },
                lines,
            )
        }
    }

    impl ListenerSink for RecordingSink {
        fn id(&self) -> Uuid {
            self.id
        }

        fn send(&mut self, line: &[u8]) -> io::Result<usize> {
            match self.mode {
                SinkMode::Accept => {
                    self.lines.lock().unwrap().push(line.to_vec());
                    Ok(line.len())
                }
                SinkMode::ShortWrite => Ok(line.len().saturating_sub(1)),
                SinkMode::Fail => Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone")),
            }
        }

        fn peer(&self) -> String {
            "test-sink".to_string()
        }
    }

    #[test]
    fn test_registry_starts_empty() {
        assert!(ListenerRegistry::new().is_empty());
    }

    #[test]
    fn test_add_refuses_beyond_capacity() {
        let mut registry = ListenerRegistry::new();
        for _ in 0..MAX_CLIENTS {
            let (sink, _) = RecordingSink::new(SinkMode::Accept);
            assert!(registry.add(Box::new(sink)));
        }

        let (extra, _) = RecordingSink::new(SinkMode::Accept);
        assert!(!registry.add(Box::new(extra)));
        assert_eq!(registry.len(), MAX_CLIENTS);
    }

    #[test]
    fn test_add_refuses_duplicate_id() {
        let mut registry = ListenerRegistry::new();
        let (sink, lines) = RecordingSink::new(SinkMode::Accept);
        let id = sink.id();
        registry.add(Box::new(sink));

        let dup = RecordingSink {
            id,
            mode: SinkMode::Accept,
            lines,
        };
        assert!(!registry.add(Box::new(dup)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_deletes_by_id() {
        let mut registry = ListenerRegistry::new();
        let (sink, _) = RecordingSink::new(SinkMode::Accept);
        let id = sink.id();
        registry.add(Box::new(sink));

        assert!(registry.remove(id));
        assert!(registry.is_empty());
        assert!(!registry.remove(id), "second removal is a no-op");
    }

    #[test]
    fn test_broadcast_delivers_to_all_listeners() {
        let mut registry = ListenerRegistry::new();
        let (a, lines_a) = RecordingSink::new(SinkMode::Accept);
        let (b, lines_b) = RecordingSink::new(SinkMode::Accept);
        registry.add(Box::new(a));
        registry.add(Box::new(b));

        let outcome = registry.broadcast(b"0054 00 up SonyBDRemote\n");

        assert_eq!(outcome, BroadcastOutcome { delivered: 2, dropped: 0 });
        assert_eq!(lines_a.lock().unwrap().len(), 1);
        assert_eq!(lines_b.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_write_drops_exactly_that_listener() {
        let mut registry = ListenerRegistry::new();
        let (before, lines_before) = RecordingSink::new(SinkMode::Accept);
        let (failing, _) = RecordingSink::new(SinkMode::Fail);
        let (after, lines_after) = RecordingSink::new(SinkMode::Accept);
        registry.add(Box::new(before));
        registry.add(Box::new(failing));
        registry.add(Box::new(after));

        let outcome = registry.broadcast(b"line one\n");

        // The listener after the failed one must not be skipped.
        assert_eq!(outcome, BroadcastOutcome { delivered: 2, dropped: 1 });
        assert_eq!(registry.len(), 2);
        assert_eq!(lines_before.lock().unwrap().len(), 1);
        assert_eq!(lines_after.lock().unwrap().len(), 1);

        // Subsequent broadcasts reach the survivors only.
        let outcome = registry.broadcast(b"line two\n");
        assert_eq!(outcome, BroadcastOutcome { delivered: 2, dropped: 0 });
        assert_eq!(lines_after.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_short_write_counts_as_failure() {
        let mut registry = ListenerRegistry::new();
        let (short, _) = RecordingSink::new(SinkMode::ShortWrite);
        registry.add(Box::new(short));

        let outcome = registry.broadcast(b"0016 00 eject SonyBDRemote\n");

        assert_eq!(outcome, BroadcastOutcome { delivered: 0, dropped: 1 });
        assert!(registry.is_empty());
    }

    #[test]
    fn test_broadcast_to_empty_registry_is_a_no_op() {
        let mut registry = ListenerRegistry::new();
        let outcome = registry.broadcast(b"anything\n");
        assert_eq!(outcome, BroadcastOutcome { delivered: 0, dropped: 0 });
    }

    #[test]
    fn test_listeners_observe_lines_in_emission_order() {
        let mut registry = ListenerRegistry::new();
        let (sink, lines) = RecordingSink::new(SinkMode::Accept);
        registry.add(Box::new(sink));

        registry.broadcast(b"0032 00 play SonyBDRemote\n");
        registry.broadcast(b"0038 00 stop SonyBDRemote\n");

        let seen = lines.lock().unwrap();
        assert_eq!(seen[0], b"0032 00 play SonyBDRemote\n");
        assert_eq!(seen[1], b"0038 00 stop SonyBDRemote\n");
    }
}
