//! The capability bridge.
//!
//! This layer translates host-originated events (connected, data arrived,
//! timer fired) into extension hook invocations, and extension requests
//! (open socket, register command, store value) into host operations.
//!
//! ```text
//! host event ──▶ SocketHandle / TimerHandle ──▶ extension hook
//!                                                    │
//!    host ◀── ExtensionContext (sockets, timers, ◀───┘
//!             commands, web pages, nv store, i18n)
//! ```
//!
//! Faults in steady-state hooks are caught here: the event delivery is
//! dropped, the failure is logged, and the faulting resource is closed or
//! cancelled. Nothing propagates to the host and other instances are never
//! affected.

pub mod command;
pub mod context;
pub mod handoff;
pub mod socket;
pub mod timer;
pub mod web;

pub use command::{dispatch_command, CommandDescriptor, CommandHandler, CommandHelp, Text};
pub use context::ExtensionContext;
pub use handoff::{offer, Handoff};
pub use socket::{ConnectConfig, ListenConfig, SocketEvent, SocketHandle, SocketHooks};
pub use timer::{TimerHandle, TimerHooks};
pub use web::{dispatch_web_request, WebSubPage, WebTemplate};

/// Bad call-site usage of the bridge.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    /// Unrecognized address-family selector passed to `listen`.
    #[error("Specified addrtype [{0}] isn't supported")]
    InvalidAddrType(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
