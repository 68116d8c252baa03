//! The report relay worker.
//!
//! One dedicated thread owns the [`KeySession`] and the repeat schedule
//! exclusively; nothing else ever touches them. The loop does three things,
//! in priority order, on every iteration:
//!
//! 1. Checks the shutdown token and exits promptly when it flips, without
//!    draining whatever is still queued.
//! 2. Drains the report queue with a non-blocking receive. Every dequeued
//!    buffer, valid or not, resets the session's timing bookkeeping before
//!    its decode result is handled, so a stale repeat timer can never leak
//!    across reports. A mapped key-down broadcasts its press line right here.
//! 3. Services the repeat schedule. Rather than spinning at a fixed interval,
//!    the worker asks the session how far away the next tick boundary is and
//!    sleeps toward it in short slices, so queued reports and shutdown are
//!    noticed within about a millisecond while the tick cadence stays exact.
//!
//! Broadcasts triggered by presses and by repeat ticks are serialized on
//! this one thread, so no two broadcasts for the same session can race.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::MutexGuard;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bdremote_core::{
    decode_report, format_event_line, KeySession, PressOutcome, RepeatConfig, TickOutcome,
    KEY_TABLE,
};
use tracing::{debug, info, warn};

use crate::application::manage_listeners::{ListenerRegistry, SharedListenerRegistry};
use crate::shutdown::ShutdownSignal;

/// Pause while no key is held.
const IDLE_SLEEP: Duration = Duration::from_micros(100);

/// Pause when the current tick boundary has already been evaluated.
const DUPLICATE_TICK_SLEEP: Duration = Duration::from_micros(10);

/// Longest single sleep toward the next tick boundary. Bounds how late the
/// worker can be to a queued report or a shutdown request.
const MAX_TICK_WAIT: Duration = Duration::from_millis(1);

/// The worker that bridges queued raw reports into broadcast lines.
pub struct ReportRelay {
    session: KeySession,
    tick_ms: u64,
    queue: Receiver<Vec<u8>>,
    registry: SharedListenerRegistry,
    shutdown: ShutdownSignal,
    /// Set once the producer side of the queue has gone away, to log the
    /// condition a single time.
    queue_gone: bool,
}

impl ReportRelay {
    pub fn new(
        config: RepeatConfig,
        queue: Receiver<Vec<u8>>,
        registry: SharedListenerRegistry,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            session: KeySession::new(),
            tick_ms: config.tick_ms(),
            queue,
            registry,
            shutdown,
            queue_gone: false,
        }
    }

    /// Runs the relay loop until the shutdown token is cancelled.
    pub fn run(mut self) {
        info!("report relay started; tick interval {} ms", self.tick_ms);

        while !self.shutdown.is_cancelled() {
            match self.queue.try_recv() {
                Ok(buf) => {
                    self.process_report(&buf);
                    continue;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    // Not fatal: a held key keeps repeating, there will just
                    // never be another report.
                    if !self.queue_gone {
                        warn!("report source disconnected; continuing without new reports");
                        self.queue_gone = true;
                    }
                }
            }

            if !self.session.is_active() {
                thread::sleep(IDLE_SLEEP);
                continue;
            }

            let elapsed = self.session.elapsed_ms(Instant::now());
            match self.session.poll_tick(elapsed, self.tick_ms) {
                TickOutcome::Repeat(index) => self.broadcast_entry(index),
                TickOutcome::Counted => {}
                TickOutcome::DuplicateTick => thread::sleep(DUPLICATE_TICK_SLEEP),
                TickOutcome::OffBoundary { next_due_ms } => {
                    thread::sleep(Duration::from_millis(next_due_ms).min(MAX_TICK_WAIT));
                }
                TickOutcome::Idle => {}
            }
        }

        info!("report relay stopped");
    }

    /// Handles one dequeued buffer.
    ///
    /// The timing reset happens before the decode result is looked at, so
    /// even a malformed buffer restarts the repeat bookkeeping.
    fn process_report(&mut self, buf: &[u8]) {
        self.session.reset_timing(Instant::now());

        match self.session.handle_event(decode_report(buf)) {
            PressOutcome::Broadcast(index) => self.broadcast_entry(index),
            PressOutcome::Tracked => debug!("unmapped key held; tracking without output"),
            PressOutcome::Released | PressOutcome::Ignored => {}
        }
    }

    /// Formats and fans out one line for the key at `index`.
    fn broadcast_entry(&self, index: usize) {
        let entry = &KEY_TABLE[index];
        // The repeat field is the literal 0 for presses and repeats alike;
        // the session's own counter is never transmitted.
        let line = format_event_line(entry.code, 0, entry.name);

        let outcome = lock_registry(&self.registry).broadcast(line.as_bytes());
        debug!(
            "broadcast '{}' to {} listener(s)",
            line.trim_end(),
            outcome.delivered
        );
        if outcome.dropped > 0 {
            info!("dropped {} listener(s) after failed writes", outcome.dropped);
        }
    }
}

/// Locks the registry, recovering from a poisoned mutex.
///
/// A poisoned lock means some other thread panicked mid-operation; the
/// listener list itself is still structurally sound, so the daemon keeps
/// serving the remaining listeners.
fn lock_registry(registry: &SharedListenerRegistry) -> MutexGuard<'_, ListenerRegistry> {
    registry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Spawns the relay loop on its own named thread.
pub fn spawn_relay_thread(
    config: RepeatConfig,
    queue: Receiver<Vec<u8>>,
    registry: SharedListenerRegistry,
    shutdown: ShutdownSignal,
) -> JoinHandle<()> {
    let relay = ReportRelay::new(config, queue, registry, shutdown);
    thread::Builder::new()
        .name("bdremote-relay".to_string())
        .spawn(move || relay.run())
        .expect("failed to spawn relay thread")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
