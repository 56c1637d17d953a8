//! `steptrace-attach` - out-of-band attach bootstrap for steptrace
//! debugging sessions.
//!
//! An already-running, uninstrumented program gains a debugging session
//! asynchronously: an external request (a registered Unix signal, or an
//! explicit call) is queued from handler context and drained at the target
//! thread's next safe scheduling point, where [`AttachSession::bootstrap`]
//! builds an isolated execution context, installs a fresh
//! [`steptrace_engine::EventDispatcher`] bound to the target thread's call
//! stack, and splices its hook in. Detaching restores the pre-attach
//! instrumentation state exactly and tears the context down.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Attach session state machine and bootstrap.
pub mod bootstrap;
/// Attach configuration.
pub mod config;
/// Isolated execution context ownership.
pub mod context;
/// Attach errors.
pub mod error;
/// Process-wide signal registration and request handoff.
#[cfg(unix)]
pub mod registry;

pub use bootstrap::{attach_state, AttachHost, AttachSession, AttachState};
pub use config::{AttachConfig, AttachRequest, DEFAULT_HOST, DEFAULT_PORT};
pub use context::IsolatedContext;
pub use error::AttachError;
#[cfg(unix)]
pub use registry::{
    register, registered, request_attach, take_pending, unregister, Registration, DEFAULT_SIGNAL,
};
