//! Instrumentation level optimization.

use crate::frame::{FrameId, FrameModel, MAX_FRAME_WALK};
use crate::session::SessionState;

/// Granularity of event delivery the host owes the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentationLevel {
    /// call + line + return + exception.
    Full,
    /// call + return only, cheaper per the host's accounting.
    Coarse,
}

/// Swaps the thread between full and coarse event delivery.
///
/// A frame with no breakpoints and no stepping target does not need line
/// events; when no frame still on the stack needs them either, the whole
/// thread drops to coarse delivery. The decision is re-evaluated at every
/// call/return boundary, never invalidated lazily. The host reads
/// [`level`](Self::level) after each call/return dispatch.
#[derive(Debug)]
pub struct InstrumentationOptimizer {
    enabled: bool,
    level: InstrumentationLevel,
}

impl InstrumentationOptimizer {
    /// A new optimizer. When disabled, the level is pinned to full.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            level: InstrumentationLevel::Full,
        }
    }

    /// Current thread-wide delivery granularity.
    #[must_use]
    pub fn level(&self) -> InstrumentationLevel {
        self.level
    }

    /// Force full delivery; used when a call event resolves to interesting.
    pub(crate) fn promote(&mut self) {
        self.level = InstrumentationLevel::Full;
    }

    /// Re-evaluate the level at a call/return boundary, walking the caller
    /// chain from `from` to the botframe looking for a live line-level
    /// hook. Active stepping always pins full delivery.
    pub(crate) fn reevaluate(
        &mut self,
        stack: &dyn FrameModel,
        from: Option<FrameId>,
        session: &SessionState,
    ) {
        if !self.enabled {
            return;
        }
        if session.stepping() {
            self.level = InstrumentationLevel::Full;
            return;
        }
        let mut cursor = from;
        let mut steps = 0_usize;
        let mut hooked = false;
        while let Some(frame) = cursor {
            if stack.frame_hook(frame).is_some() {
                hooked = true;
                break;
            }
            if Some(frame) == session.botframe {
                break;
            }
            steps += 1;
            if steps > MAX_FRAME_WALK {
                // Malformed chain; stay at full delivery.
                hooked = true;
                break;
            }
            cursor = stack.caller(frame);
        }
        self.level = if hooked {
            InstrumentationLevel::Full
        } else {
            InstrumentationLevel::Coarse
        };
    }
}
