//! Scripted report source for tests and hardware-less runs.

use std::sync::mpsc;
use std::sync::Mutex;

use super::{ReportSource, TransportError};

/// Replays a fixed list of report buffers in order, then stays silent.
///
/// The channel stays open after the script is exhausted so the worker keeps
/// seeing an empty (not disconnected) queue, matching a quiet remote.
pub struct MockReportSource {
    reports: Vec<Vec<u8>>,
    /// Keeps the sending half alive after the script is replayed.
    keep_alive: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
}

impl MockReportSource {
    pub fn new(reports: Vec<Vec<u8>>) -> Self {
        Self {
            reports,
            keep_alive: Mutex::new(None),
        }
    }
}

impl ReportSource for MockReportSource {
    fn start(&self) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        let mut keep_alive = self.keep_alive.lock().expect("mock lock");
        if keep_alive.is_some() {
            return Err(TransportError::AlreadyStarted);
        }

        let (tx, rx) = mpsc::channel();
        for report in &self.reports {
            // Receiver is in scope; the send cannot fail.
            let _ = tx.send(report.clone());
        }
        *keep_alive = Some(tx);
        Ok(rx)
    }

    fn stop(&self) {
        self.keep_alive.lock().expect("mock lock").take();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
