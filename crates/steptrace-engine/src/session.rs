//! Session stepping state.

use crate::frame::FrameId;

/// Line threshold applied within the stop frame.
///
/// An explicit tagged value: line zero is a legal stepping target and is not
/// conflated with "no threshold".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopLine {
    /// Any line qualifies.
    #[default]
    Any,
    /// No line qualifies; only return events can stop.
    Never,
    /// Lines at or past the target qualify.
    AtOrAfter(u32),
}

/// Bookkeeping for one debugging session.
///
/// The meaning of `(stopframe, stop_line)`:
/// - `(None, Any)`: stop at the next line anywhere;
/// - `(None, Never)`: never stop on a line (continue);
/// - `(Some(f), Any)`: stop at the next line in `f`;
/// - `(Some(f), Never)`: stop when returning from `f`;
/// - `(Some(f), AtOrAfter(n))`: stop in `f` once the line reaches `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub(crate) botframe: Option<FrameId>,
    pub(crate) topframe: Option<FrameId>,
    pub(crate) stopframe: Option<FrameId>,
    pub(crate) stop_line: StopLine,
    pub(crate) quitting: bool,
    pub(crate) ignore_first_call: bool,
}

impl SessionState {
    /// A fresh session with no stepping target and no botframe.
    #[must_use]
    pub fn new() -> Self {
        Self {
            botframe: None,
            topframe: None,
            stopframe: None,
            stop_line: StopLine::Any,
            quitting: false,
            ignore_first_call: false,
        }
    }

    /// Reset the session for a new debugged call chain.
    ///
    /// `ignore_first_call` arms a one-shot absorption of the next call
    /// event; `botframe` keeps an existing bottom frame when re-entering a
    /// running session.
    pub fn reset(&mut self, ignore_first_call: bool, botframe: Option<FrameId>) {
        self.ignore_first_call = ignore_first_call;
        self.botframe = botframe;
        self.topframe = None;
        self.stopframe = None;
        self.stop_line = StopLine::Any;
        self.quitting = false;
    }

    /// Oldest frame of the debugged call chain.
    #[must_use]
    pub fn botframe(&self) -> Option<FrameId> {
        self.botframe
    }

    /// Frame of the user callback currently being delivered, if any.
    #[must_use]
    pub fn topframe(&self) -> Option<FrameId> {
        self.topframe
    }

    /// Frame the next stop is scoped to; `None` means any frame qualifies.
    #[must_use]
    pub fn stopframe(&self) -> Option<FrameId> {
        self.stopframe
    }

    /// Line threshold within the stop frame.
    #[must_use]
    pub fn stop_line(&self) -> StopLine {
        self.stop_line
    }

    /// Whether the front end asked the session to end.
    #[must_use]
    pub fn quitting(&self) -> bool {
        self.quitting
    }

    /// Whether an active stepping target exists.
    pub(crate) fn stepping(&self) -> bool {
        self.stopframe.is_some() || self.stop_line != StopLine::Never
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_is_idempotent() {
        let mut first = SessionState::new();
        first.stopframe = Some(FrameId(4));
        first.stop_line = StopLine::AtOrAfter(12);
        first.quitting = true;
        first.reset(true, Some(FrameId(1)));

        let mut second = first;
        second.reset(true, Some(FrameId(1)));
        assert_eq!(first, second);
    }

    #[test]
    fn stepping_reflects_stop_state() {
        let mut session = SessionState::new();
        assert!(session.stepping());

        session.stopframe = None;
        session.stop_line = StopLine::Never;
        assert!(!session.stepping());

        session.stopframe = Some(FrameId(2));
        assert!(session.stepping());
    }
}
