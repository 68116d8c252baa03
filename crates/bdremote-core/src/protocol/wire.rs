//! The listener-facing wire format.
//!
//! Listeners speak a one-line ASCII protocol; there is exactly one message
//! type on the channel:
//!
//! ```text
//! <code> <repeats> <name> <source>\n
//! 0054 00 up SonyBDRemote
//! ```
//!
//! The key code is four uppercase hex digits, the repeat field two decimal
//! digits, then the key's symbolic name and a fixed tag identifying the
//! remote model.
//!
//! The repeat field on the wire is always the literal `0`, for synthesized
//! repeat events too; the per-session repeat counter exists only for
//! bookkeeping and is never transmitted.

/// Fixed source tag terminating every broadcast line.
pub const SOURCE_TAG: &str = "SonyBDRemote";

/// Formats one broadcast line, including the trailing newline.
pub fn format_event_line(code: u16, repeats: u32, name: &str) -> String {
    format!("{code:04X} {repeats:02} {name} {SOURCE_TAG}\n")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
