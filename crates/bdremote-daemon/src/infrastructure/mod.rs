//! Infrastructure layer for the daemon.
//!
//! Contains OS-facing adapters: the TCP acceptor for listeners, the report
//! transport that reads the remote's HID device, and configuration storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `bdremote_core`, but MUST NOT be imported by the `application` layer.

pub mod net;
pub mod storage;
pub mod transport;
