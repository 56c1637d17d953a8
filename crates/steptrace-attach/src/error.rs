//! Attach errors.

use smol_str::SmolStr;
use steptrace_engine::TraceError;
use thiserror::Error;

/// Attach bootstrap and registration errors.
///
/// Every precondition failure is reported synchronously to the caller of
/// the attach request, with no partial state left behind.
#[derive(Debug, Error)]
pub enum AttachError {
    /// A debugging session is already attached process-wide; concurrent
    /// sessions are rejected, not queued.
    #[error("a debugging session is already attached")]
    AlreadyAttached,

    /// The host runtime has not finished bootstrapping.
    #[error("host runtime is not ready for attach")]
    RuntimeNotReady,

    /// A mutually exclusive instrumentation tool is active. The host must
    /// treat this as fatal instead of running two instrumentation users
    /// over the same thread.
    #[error("conflicting instrumentation tool '{0}' is active")]
    ToolConflict(SmolStr),

    /// Isolated-context construction failed. The target thread's original
    /// hook is untouched.
    #[error("isolated context construction failed")]
    ContextSetup(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Building the session front end inside the context failed; the
    /// context has been torn down.
    #[error("attach front-end setup failed")]
    ClientSetup(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Installing the dispatcher on the target stack failed; the context
    /// has been torn down.
    #[error("attach dispatcher install failed")]
    Engine(#[from] TraceError),

    /// Registering the signal handler failed.
    #[error("cannot register attach signal {signum}")]
    Signal {
        /// The signal number that was requested.
        signum: i32,
        /// The registration failure.
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be parsed.
    #[error("invalid attach config: {0}")]
    InvalidConfig(SmolStr),
}
