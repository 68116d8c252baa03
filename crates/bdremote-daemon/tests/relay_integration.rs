//! End-to-end tests for the daemon: mock transport → relay worker → listener
//! registry, and the full TCP path through the acceptor.

use std::io::{self, Read};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bdremote_core::{RepeatConfig, RELEASE_CODE, REPORT_LEN, REPORT_MAGIC};
use bdremote_daemon::application::manage_listeners::{
    shared_registry, ListenerSink, SharedListenerRegistry,
};
use bdremote_daemon::application::relay_reports::spawn_relay_thread;
use bdremote_daemon::infrastructure::net::start_listener_acceptor;
use bdremote_daemon::infrastructure::transport::mock::MockReportSource;
use bdremote_daemon::infrastructure::transport::ReportSource;
use bdremote_daemon::shutdown::ShutdownSignal;
use uuid::Uuid;

// ── Test helpers ──────────────────────────────────────────────────────────────

fn report(code: u8, state: u8) -> Vec<u8> {
    let mut buf = vec![0u8; REPORT_LEN];
    buf[0] = REPORT_MAGIC;
    buf[5] = code;
    buf[11] = state;
    buf
}

/// Listener test double that records complete lines, optionally failing.
struct RecordingSink {
    id: Uuid,
    fail: bool,
    lines: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    fn register(registry: &SharedListenerRegistry, fail: bool) -> Arc<Mutex<Vec<String>>> {
        let lines = Arc::new(Mutex::new(Vec::new()));
        registry.lock().unwrap().add(Box::new(Self {
            id: Uuid::new_v4(),
            fail,
            lines: Arc::clone(&lines),
        }));
        lines
    }
}

impl ListenerSink for RecordingSink {
    fn id(&self) -> Uuid {
        self.id
    }

    fn send(&mut self, line: &[u8]) -> io::Result<usize> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        }
        self.lines
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(line).into_owned());
        Ok(line.len())
    }

    fn peer(&self) -> String {
        "recording".to_string()
    }
}

/// Polls `cond` for up to two seconds.
fn wait_for<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

// ── Worker end-to-end ─────────────────────────────────────────────────────────

#[test]
fn press_reaches_every_listener_through_the_worker() {
    let registry = shared_registry();
    let lines_a = RecordingSink::register(&registry, false);
    let lines_b = RecordingSink::register(&registry, false);

    let source = MockReportSource::new(vec![report(0x54, 1), report(RELEASE_CODE, 0)]);
    let queue = source.start().expect("source start");

    let shutdown = ShutdownSignal::new();
    let relay = spawn_relay_thread(
        RepeatConfig::default(),
        queue,
        Arc::clone(&registry),
        shutdown.clone(),
    );

    assert!(
        wait_for(|| !lines_a.lock().unwrap().is_empty() && !lines_b.lock().unwrap().is_empty()),
        "both listeners must receive the press line"
    );

    shutdown.cancel();
    relay.join().expect("relay join");

    // Press only; the release produced nothing.
    assert_eq!(lines_a.lock().unwrap().as_slice(), ["0054 00 up SonyBDRemote\n"]);
    assert_eq!(lines_b.lock().unwrap().as_slice(), ["0054 00 up SonyBDRemote\n"]);
}

#[test]
fn held_key_produces_repeats_after_the_silent_window() {
    let registry = shared_registry();
    let lines = RecordingSink::register(&registry, false);

    // 100 events/s → 10 ms tick → first repeat due 40 ms after the press.
    let config = RepeatConfig {
        repeat_rate: 100,
        debug: false,
    };
    let source = MockReportSource::new(vec![report(0x32, 1)]); // "play", never released
    let queue = source.start().expect("source start");

    let shutdown = ShutdownSignal::new();
    let relay = spawn_relay_thread(config, queue, Arc::clone(&registry), shutdown.clone());

    assert!(
        wait_for(|| lines.lock().unwrap().len() >= 4),
        "press plus several repeats must arrive while the key stays held"
    );

    shutdown.cancel();
    relay.join().expect("relay join");

    let seen = lines.lock().unwrap();
    // Every line is identical: same key, repeat field always the literal 0.
    for line in seen.iter() {
        assert_eq!(line, "0032 00 play SonyBDRemote\n");
    }
}

#[test]
fn unmapped_key_produces_no_output_while_held() {
    let registry = shared_registry();
    let lines = RecordingSink::register(&registry, false);

    let config = RepeatConfig {
        repeat_rate: 100,
        debug: false,
    };
    let source = MockReportSource::new(vec![report(0x77, 1)]); // not in the key table
    let queue = source.start().expect("source start");

    let shutdown = ShutdownSignal::new();
    let relay = spawn_relay_thread(config, queue, Arc::clone(&registry), shutdown.clone());

    // Long enough for repeats to have fired if they were going to.
    thread::sleep(Duration::from_millis(200));

    shutdown.cancel();
    relay.join().expect("relay join");

    assert!(lines.lock().unwrap().is_empty());
}

#[test]
fn failing_listener_is_pruned_and_the_rest_keep_receiving() {
    let registry = shared_registry();
    let healthy = RecordingSink::register(&registry, false);
    let _failing = RecordingSink::register(&registry, true);
    assert_eq!(registry.lock().unwrap().len(), 2);

    let source = MockReportSource::new(vec![report(0x16, 1), report(RELEASE_CODE, 0)]); // "eject"
    let queue = source.start().expect("source start");

    let shutdown = ShutdownSignal::new();
    let relay = spawn_relay_thread(
        RepeatConfig::default(),
        queue,
        Arc::clone(&registry),
        shutdown.clone(),
    );

    assert!(
        wait_for(|| !healthy.lock().unwrap().is_empty()),
        "healthy listener must receive the press"
    );
    assert!(
        wait_for(|| registry.lock().unwrap().len() == 1),
        "failing listener must be removed, exactly one survivor"
    );

    shutdown.cancel();
    relay.join().expect("relay join");

    assert_eq!(
        healthy.lock().unwrap().as_slice(),
        ["0016 00 eject SonyBDRemote\n"]
    );
}

#[test]
fn worker_shuts_down_promptly_while_idle() {
    let registry = shared_registry();
    let source = MockReportSource::new(Vec::new());
    let queue = source.start().expect("source start");

    let shutdown = ShutdownSignal::new();
    let relay = spawn_relay_thread(
        RepeatConfig::default(),
        queue,
        registry,
        shutdown.clone(),
    );

    thread::sleep(Duration::from_millis(20));
    shutdown.cancel();
    relay.join().expect("relay must exit after cancellation");
}

// ── Full TCP path ─────────────────────────────────────────────────────────────

#[test]
fn tcp_listener_receives_the_press_line() {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);

    let registry = shared_registry();
    let shutdown = ShutdownSignal::new();

    let acceptor =
        start_listener_acceptor("127.0.0.1", port, Arc::clone(&registry), shutdown.clone())
            .expect("acceptor start");

    let mut client = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    assert!(wait_for(|| registry.lock().unwrap().len() == 1));

    let source = MockReportSource::new(vec![report(0x56, 1), report(RELEASE_CODE, 0)]); // "down"
    let queue = source.start().expect("source start");
    let relay = spawn_relay_thread(
        RepeatConfig::default(),
        queue,
        Arc::clone(&registry),
        shutdown.clone(),
    );

    let expected = b"0056 00 down SonyBDRemote\n";
    let mut buf = vec![0u8; expected.len()];
    client
        .read_exact(&mut buf)
        .expect("client must receive the press line");
    assert_eq!(buf, expected);

    shutdown.cancel();
    relay.join().expect("relay join");
    acceptor.join().expect("acceptor join");
}
