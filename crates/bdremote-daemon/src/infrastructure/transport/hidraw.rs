//! HID raw device report source (Linux).
//!
//! Opens a `/dev/hidrawN` node and reads input reports on a dedicated
//! thread. Each successful read forwards exactly the bytes the kernel
//! returned; the decoder discards anything that is not a well-formed
//! 13-byte report, so no shaping happens here.

use std::fs::File;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use tracing::{debug, error, info};

use super::{ReportSource, TransportError};

/// Largest report the reader will accept in one read.
const READ_BUF_LEN: usize = 64;

/// Report source backed by a HID raw device node.
pub struct HidrawSource {
    device: String,
    running: Arc<AtomicBool>,
    started: Mutex<bool>,
}

impl HidrawSource {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            running: Arc::new(AtomicBool::new(false)),
            started: Mutex::new(false),
        }
    }
}

impl ReportSource for HidrawSource {
    fn start(&self) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        let mut started = self.started.lock().expect("hidraw lock");
        if *started {
            return Err(TransportError::AlreadyStarted);
        }

        let file = File::open(&self.device).map_err(|source| TransportError::OpenFailed {
            device: self.device.clone(),
            source,
        })?;

        let (tx, rx) = mpsc::channel();
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::Relaxed);

        let device = self.device.clone();
        thread::Builder::new()
            .name("bdremote-hidraw".to_string())
            .spawn(move || read_loop(file, device, tx, running))
            .expect("failed to spawn hidraw thread");

        *started = true;
        Ok(rx)
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

/// Blocking read loop executed on the reader thread.
///
/// Exits when the stop flag clears, the receiver goes away, or the device
/// returns a non-retryable error (unplugged remote).
fn read_loop(
    mut file: File,
    device: String,
    tx: mpsc::Sender<Vec<u8>>,
    running: Arc<AtomicBool>,
) {
    info!("reading reports from {device}");
    let mut buf = [0u8; READ_BUF_LEN];

    while running.load(Ordering::Relaxed) {
        match file.read(&mut buf) {
            Ok(0) => {
                info!("{device} reached end of stream");
                break;
            }
            Ok(n) => {
                debug!("report of {n} byte(s) from {device}");
                if tx.send(buf[..n].to_vec()).is_err() {
                    // Worker gone; nothing left to feed.
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                error!("read error on {device}: {e}");
                break;
            }
        }
    }

    info!("hidraw reader for {device} stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
