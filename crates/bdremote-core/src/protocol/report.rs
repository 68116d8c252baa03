//! Decoder for the remote's raw HID input reports.
//!
//! Report layout (13 bytes total):
//! ```text
//! [magic:1][?:1][mask:3][code:1][...:5][state:1][?:1]
//!  off 0          off 2   off 5          off 11
//! ```
//! The magic byte is always `0xA1` (HID DATA|INPUT). The mask carries the
//! lower 24 bits of the remote's button bitmap, little-endian. The state byte
//! is 1 while a key is down and 0 when it is released.
//!
//! Decoding is stateless and happens once per dequeued report. Anything that
//! does not match the layout exactly decodes to [`ReportEvent::Invalid`] and
//! is discarded without effect by the caller.

/// Exact length of a valid raw report in bytes.
pub const REPORT_LEN: usize = 13;

/// First byte of every valid report.
pub const REPORT_MAGIC: u8 = 0xA1;

/// Byte offset of the 24-bit button mask.
const OFFSET_MASK: usize = 2;
/// Byte offset of the key code.
const OFFSET_CODE: usize = 5;
/// Byte offset of the transition state byte.
const OFFSET_STATE: usize = 11;

/// The key transition extracted from one raw report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportEvent {
    /// Wrong length, wrong magic, or an unknown state byte. Discard.
    Invalid,
    /// A key went down.
    KeyDown {
        /// Hardware key code.
        code: u8,
        /// Lower 24 bits of the button bitmap.
        mask: u32,
    },
    /// A key was released.
    KeyUp {
        /// Hardware key code carried by the release report.
        code: u8,
        /// Lower 24 bits of the button bitmap.
        mask: u32,
    },
}

/// Decodes one raw report buffer into a [`ReportEvent`].
///
/// A report is valid only when its length is exactly [`REPORT_LEN`] and its
/// first byte equals [`REPORT_MAGIC`]; everything else is [`ReportEvent::Invalid`].
pub fn decode_report(buf: &[u8]) -> ReportEvent {
    if buf.len() != REPORT_LEN || buf[0] != REPORT_MAGIC {
        return ReportEvent::Invalid;
    }

    let mask = u32::from_le_bytes([
        buf[OFFSET_MASK],
        buf[OFFSET_MASK + 1],
        buf[OFFSET_MASK + 2],
        0,
    ]);
    let code = buf[OFFSET_CODE];

    match buf[OFFSET_STATE] {
        1 => ReportEvent::KeyDown { code, mask },
        0 => ReportEvent::KeyUp { code, mask },
        _ => ReportEvent::Invalid,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
