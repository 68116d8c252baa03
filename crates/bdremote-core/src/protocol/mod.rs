//! Protocol module containing the raw report decoder and the wire format.

pub mod report;
pub mod wire;

pub use report::{decode_report, ReportEvent};
pub use wire::format_event_line;
