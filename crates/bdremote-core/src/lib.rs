//! # bdremote-core
//!
//! Shared library for bdremoted containing the raw report decoder, the
//! remote's key table, the listener-facing wire format, and the key-session
//! state machine that turns transient down/up transitions into press and
//! auto-repeat events.
//!
//! This crate is used by the daemon and by its integration tests.
//! It has zero dependencies on OS APIs or network sockets.
//!
//! # Architecture overview
//!
//! The Sony BD remote reports only edges: one report when a key goes down and
//! one when it is released. Listeners, on the other hand, expect a press line
//! immediately and then a steady stream of repeat lines while the key stays
//! held. Bridging the two is the job of this crate's pure logic:
//!
//! - **`protocol`** – How bytes come in and go out. `protocol::report`
//!   validates a fixed-size 13-byte report and extracts the key transition;
//!   `protocol::wire` formats the single ASCII line type listeners consume.
//!
//! - **`keytable`** – The static mapping from hardware key codes to symbolic
//!   names and the code echoed back on the wire.
//!
//! - **`session`** – The `KeySession` state machine: which key is held, when
//!   it was pressed, and when the next repeat event is due.

// Declare the three top-level modules.  Rust will look for each in a
// subdirectory with the same name (e.g., src/protocol/mod.rs).
pub mod keytable;
pub mod protocol;
pub mod session;

// Re-export the most-used types at the crate root so callers can write
// `bdremote_core::KeySession` instead of `bdremote_core::session::KeySession`.
pub use keytable::{code_to_index, KeyTableEntry, KEY_TABLE, RELEASE_CODE};
pub use protocol::report::{decode_report, ReportEvent, REPORT_LEN, REPORT_MAGIC};
pub use protocol::wire::{format_event_line, SOURCE_TAG};
pub use session::{
    KeySession, PressOutcome, RepeatConfig, TickOutcome, REPEATS_BEFORE_TRANSMIT,
};
