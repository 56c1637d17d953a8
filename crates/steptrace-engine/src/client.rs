//! Front-end capability interface.

use crate::breakpoints::BreakpointHits;
use crate::dispatch::SessionControl;
use crate::frame::{FrameId, FrameView};

/// Failure raised by a user-visible callback. Treated as fatal by the
/// dispatcher: instrumentation is disabled and the failure propagates to the
/// host.
pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// What the front end wants the engine to do after a user-visible stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// Leave the current stepping state in place.
    Unchanged,
    /// Stop at the next line, wherever execution goes.
    Step,
    /// Stop at the next line in `frame` or below it.
    Next(FrameId),
    /// Stop when returning from `frame`.
    Return(FrameId),
    /// Stop in `frame` once the line reaches `line`, or on return from it.
    Until {
        /// Frame the threshold applies to.
        frame: FrameId,
        /// First line that qualifies for the stop.
        line: u32,
    },
    /// Run until the next breakpoint.
    Continue,
    /// End the session and unwind the debugged call chain.
    Quit,
}

/// Capabilities the front end provides to the engine.
///
/// Injected at dispatcher construction and held as a polymorphic dependency;
/// the engine calls back into it at user-visible stops. The default
/// `user_*` implementations keep the stepping state untouched; front ends
/// override the ones they interact on. `is_skipped_unit` and `stop_tracing`
/// have no sensible default and must be supplied.
pub trait DebugClient {
    /// Host value attached to return and exception events.
    type Value;

    /// Execution entered a frame the session is interested in.
    fn user_call(
        &mut self,
        ctl: &mut SessionControl<'_>,
        frame: FrameId,
    ) -> Result<Resume, ClientError> {
        let _ = (ctl, frame);
        Ok(Resume::Unchanged)
    }

    /// The stepping state halted execution at a line.
    fn user_line(
        &mut self,
        ctl: &mut SessionControl<'_>,
        frame: FrameId,
    ) -> Result<Resume, ClientError> {
        let _ = (ctl, frame);
        Ok(Resume::Unchanged)
    }

    /// At least one breakpoint resolved at the current line.
    ///
    /// Hit-count, condition and temporary-breakpoint bookkeeping belongs to
    /// the implementation; the engine reports the raw hit set only.
    fn user_breakpoints(
        &mut self,
        ctl: &mut SessionControl<'_>,
        frame: FrameId,
        hits: &BreakpointHits,
    ) -> Result<Resume, ClientError> {
        let _ = (ctl, frame, hits);
        Ok(Resume::Unchanged)
    }

    /// A stop-qualifying frame is returning.
    fn user_return(
        &mut self,
        ctl: &mut SessionControl<'_>,
        frame: FrameId,
        value: &Self::Value,
    ) -> Result<Resume, ClientError> {
        let _ = (ctl, frame, value);
        Ok(Resume::Unchanged)
    }

    /// An exception was raised at a stop-qualifying frame.
    fn user_exception(
        &mut self,
        ctl: &mut SessionControl<'_>,
        frame: FrameId,
        exc: &Self::Value,
    ) -> Result<Resume, ClientError> {
        let _ = (ctl, frame, exc);
        Ok(Resume::Unchanged)
    }

    /// Whether the unit executing in `frame` must never stop. Consulted only
    /// when skip rules are configured.
    fn is_skipped_unit(&self, frame: FrameView<'_>) -> bool;

    /// The session stopped delivering events: the debugged call chain
    /// unwound past the botframe, or tracing was torn down.
    fn stop_tracing(&mut self, frame: Option<FrameId>);
}
