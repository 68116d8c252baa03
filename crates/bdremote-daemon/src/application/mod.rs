//! Application layer for the daemon.
//!
//! The modules here orchestrate the pure logic in `bdremote-core` without
//! performing any OS calls themselves; sockets and device nodes reach them
//! only through the seams defined in this layer (the [`manage_listeners::ListenerSink`]
//! trait, the report queue).
//!
//! # Sub-modules
//!
//! - **`relay_reports`** – The worker: drains queued raw reports, drives the
//!   key session, and schedules repeat broadcasts. This is the only thread
//!   that touches the session.
//!
//! - **`manage_listeners`** – The shared listener registry and the broadcast
//!   fanout that delivers one line to every connected listener, pruning the
//!   ones whose write fails.

pub mod manage_listeners;
pub mod relay_reports;
