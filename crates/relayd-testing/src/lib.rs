//! Testing utilities for the relayd extension core.
//!
//! This crate provides:
//! - Mock host services (sockets, timers, directory) that record calls
//! - Sample extensions covering the lifecycle paths tests exercise
//! - Socket and timer hooks that record or fault on demand
//! - An on-disk package builder for locator fixtures

pub mod extensions;
pub mod hooks;
pub mod hosts;
pub mod pack;

pub use extensions::{
    ChainUnloadExtension, FaultyExtension, RecordingExtension, RecordingHandler,
    RejectingExtension, UnloadRequest,
};
pub use hooks::{FaultySocketHooks, FaultyTimerHooks, RecordingSocketHooks, RecordingTimerHooks};
pub use hosts::{test_services, MockDirectory, MockSocketHost, MockTimerHost};
pub use pack::PackageBuilder;

use std::sync::Arc;

use parking_lot::Mutex;

/// Shared event log fixtures append to.
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Create an empty event log.
pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Snapshot the log contents.
pub fn log_entries(log: &EventLog) -> Vec<String> {
    log.lock().clone()
}
