//! Engine errors.

use smol_str::SmolStr;
use thiserror::Error;

/// Errors surfaced by the event dispatcher.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The front end asked the session to end. Not a failure: the host must
    /// unwind the debugged call chain without reporting an error.
    #[error("debugging session ended")]
    Quit,

    /// A user-visible callback failed. Instrumentation has already been
    /// disabled on the thread; the host must surface `unit` and `line` as a
    /// best-effort traceback.
    #[error("debugger callback failed in '{unit}' at line {line}")]
    Callback {
        /// Source unit of the frame that delivered the event.
        unit: SmolStr,
        /// Line executing when the callback failed.
        line: u32,
        /// The underlying callback failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The host handed the engine a caller chain that never reaches the
    /// session botframe.
    #[error("malformed frame state: {0}")]
    FrameState(&'static str),

    /// Configuration could not be parsed.
    #[error("invalid tracer config: {0}")]
    InvalidConfig(SmolStr),
}
