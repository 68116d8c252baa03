//! Report transport: feeds raw report buffers into the worker's queue.
//!
//! The remote delivers its 13-byte input reports through a HID raw device
//! node. The daemon reads them on a dedicated thread and pushes each buffer,
//! untouched, into an `mpsc` channel; validation is entirely the decoder's
//! job, so a truncated or garbled read travels the same path as a good one
//! and is discarded downstream.
//!
//! # Testability
//!
//! The [`ReportSource`] trait is the seam: production uses
//! [`hidraw::HidrawSource`], tests and hardware-less runs use
//! [`mock::MockReportSource`], which replays a scripted list of buffers.

use std::io;
use std::sync::mpsc;

use thiserror::Error;

pub mod mock;

#[cfg(target_os = "linux")]
pub mod hidraw;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The device node could not be opened.
    #[error("failed to open report device {device}: {source}")]
    OpenFailed {
        device: String,
        #[source]
        source: io::Error,
    },
    /// The source was started a second time.
    #[error("report source already started")]
    AlreadyStarted,
}

/// Trait abstracting report production.
pub trait ReportSource: Send {
    /// Starts the source and returns the receiving end of its report queue.
    fn start(&self) -> Result<mpsc::Receiver<Vec<u8>>, TransportError>;

    /// Stops the source and releases its resources.
    fn stop(&self);
}
