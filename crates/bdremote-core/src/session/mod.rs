//! Key-session state machine and repeat-tick policy.
//!
//! The remote reports a key exactly twice: once going down and once on
//! release. The stream of auto-repeat events a held key must produce in
//! between is synthesized here.
//!
//! # State machine
//!
//! A [`KeySession`] is either **Idle** or **Active**. A key-down report for a
//! real key makes it Active and (when the code resolves in the key table)
//! asks the caller to broadcast a press immediately. A key-up report carrying
//! the release sentinel returns it to Idle. No broadcast happens on release;
//! the line protocol is press/repeat only.
//!
//! # Repeat cadence
//!
//! While Active, time is divided into *ticks* of `1000 / repeat_rate`
//! milliseconds (1000 ms when the rate is unset). The first
//! [`REPEATS_BEFORE_TRANSMIT`] + 1 tick boundaries after the press are
//! silent; every boundary after that produces one repeat event. With the
//! default 1000 ms tick:
//!
//! ```text
//! t=0       press broadcast
//! t=1000    counted, silent
//! t=2000    counted, silent
//! t=3000    counted, silent
//! t=4000    first repeat broadcast
//! t=5000    repeat broadcast ... (one per second until release)
//! ```
//!
//! [`KeySession::poll_tick`] takes the elapsed time as an explicit argument,
//! so the owning worker decides how to wait for the next boundary and tests
//! can drive the cadence deterministically. A boundary is evaluated at most
//! once even if the caller polls the same elapsed value repeatedly, and a
//! late poll still fires the boundary it crossed.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::keytable::{code_to_index, RELEASE_CODE};
use crate::protocol::report::ReportEvent;

/// Tick boundaries that must elapse after a press before repeats begin.
pub const REPEATS_BEFORE_TRANSMIT: u32 = 2;

/// Repeat behaviour configuration, immutable for the worker's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatConfig {
    /// Repeat events per second. 0 means one tick per second.
    #[serde(default)]
    pub repeat_rate: u32,
    /// Enables verbose per-event logging. No semantic effect.
    #[serde(default)]
    pub debug: bool,
}

impl Default for RepeatConfig {
    fn default() -> Self {
        Self {
            repeat_rate: 0,
            debug: false,
        }
    }
}

impl RepeatConfig {
    /// The tick interval in milliseconds derived from the configured rate.
    ///
    /// Rates above 1000 events/s clamp to a 1 ms tick.
    pub fn tick_ms(&self) -> u64 {
        if self.repeat_rate > 0 {
            (1000 / u64::from(self.repeat_rate)).max(1)
        } else {
            1000
        }
    }
}

/// What the caller must do after feeding one decoded report to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// A mapped key went down: broadcast its press line now.
    Broadcast(usize),
    /// An unmapped key went down: the session is Active but stays silent.
    Tracked,
    /// The held key was released; the session is Idle again.
    Released,
    /// Nothing changed (invalid report or a transition that does not apply).
    Ignored,
}

/// What the caller must do after one repeat poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No key is held.
    Idle,
    /// Between boundaries; the next one is due in `next_due_ms`.
    OffBoundary {
        /// Milliseconds until the next tick boundary.
        next_due_ms: u64,
    },
    /// Exactly on a boundary that was already evaluated this tick.
    DuplicateTick,
    /// A fresh boundary was counted but the repeat threshold is not met yet,
    /// or the held key has no table entry to broadcast.
    Counted,
    /// A fresh boundary past the threshold: broadcast a repeat line for the
    /// key at this table index.
    Repeat(usize),
}

/// The single active key session.
///
/// Exclusively owned and mutated by the worker thread; never shared.
#[derive(Debug)]
pub struct KeySession {
    /// Whether a key is currently held.
    active: bool,
    /// Table index of the held key; `None` while Active means the hardware
    /// code had no mapping and the hold produces no output.
    key: Option<usize>,
    /// Monotonic instant of the most recent timing reset.
    pressed_at: Instant,
    /// Elapsed value of the last tick boundary that was evaluated.
    last_tick_elapsed: u64,
    /// Boundaries observed since the press.
    repeat_count: u32,
    /// Repeat events emitted since the press. Bookkeeping only; the wire
    /// always carries 0.
    repeats_sent: u32,
}

impl KeySession {
    pub fn new() -> Self {
        Self {
            active: false,
            key: None,
            pressed_at: Instant::now(),
            last_tick_elapsed: 0,
            repeat_count: 0,
            repeats_sent: 0,
        }
    }

    /// Resets all timing bookkeeping to a fresh press at `now`.
    ///
    /// Called for every dequeued report before its decode result is handled,
    /// so stale timers never leak across reports. The Idle/Active state and
    /// the held key are untouched.
    pub fn reset_timing(&mut self, now: Instant) {
        self.pressed_at = now;
        self.last_tick_elapsed = 0;
        self.repeat_count = 0;
        self.repeats_sent = 0;
    }

    /// Applies one decoded report to the state machine.
    pub fn handle_event(&mut self, event: ReportEvent) -> PressOutcome {
        match event {
            ReportEvent::KeyDown { code, mask } if code != RELEASE_CODE => {
                debug!("key down: {code:02X}, mask {mask:06X}");
                let index = code_to_index(code);
                self.active = true;
                self.key = index;
                self.repeat_count = 0;
                self.repeats_sent = 0;
                match index {
                    Some(index) => PressOutcome::Broadcast(index),
                    None => PressOutcome::Tracked,
                }
            }
            ReportEvent::KeyUp { code, mask } if code == RELEASE_CODE && self.active => {
                debug!("key up: {code:02X}, mask {mask:06X}");
                self.active = false;
                self.key = None;
                self.last_tick_elapsed = 0;
                self.repeat_count = 0;
                self.repeats_sent = 0;
                PressOutcome::Released
            }
            _ => PressOutcome::Ignored,
        }
    }

    /// Evaluates the repeat policy for the given elapsed time.
    ///
    /// `elapsed_ms` is milliseconds since the last timing reset; `tick_ms`
    /// comes from [`RepeatConfig::tick_ms`]. Each boundary fires exactly once:
    /// polling the same boundary again yields [`TickOutcome::DuplicateTick`],
    /// and polling late fires the boundary that was crossed.
    pub fn poll_tick(&mut self, elapsed_ms: u64, tick_ms: u64) -> TickOutcome {
        if !self.active {
            return TickOutcome::Idle;
        }

        let tick = tick_ms.max(1);
        // Most recent boundary at or before `elapsed_ms`. Boundary 0 is the
        // press itself and never fires.
        let boundary = (elapsed_ms / tick) * tick;
        if boundary == 0 {
            return TickOutcome::OffBoundary {
                next_due_ms: tick - elapsed_ms,
            };
        }
        if boundary == self.last_tick_elapsed {
            if elapsed_ms == boundary {
                return TickOutcome::DuplicateTick;
            }
            return TickOutcome::OffBoundary {
                next_due_ms: boundary + tick - elapsed_ms,
            };
        }

        self.last_tick_elapsed = boundary;
        let due = self.repeat_count > REPEATS_BEFORE_TRANSMIT;
        self.repeat_count += 1;
        if due {
            if let Some(index) = self.key {
                self.repeats_sent += 1;
                return TickOutcome::Repeat(index);
            }
        }
        TickOutcome::Counted
    }

    /// Milliseconds elapsed between the last timing reset and `now`.
    pub fn elapsed_ms(&self, now: Instant) -> u64 {
        now.duration_since(self.pressed_at).as_millis() as u64
    }

    /// Whether a key is currently held.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Table index of the held key, when Active and resolved.
    pub fn key_index(&self) -> Option<usize> {
        self.key
    }

    /// Repeat events emitted since the current press.
    pub fn repeats_sent(&self) -> u32 {
        self.repeats_sent
    }
}

impl Default for KeySession {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
