//! Stop decisions and skip rules.

use glob::Pattern;
use smol_str::SmolStr;
use tracing::warn;

use crate::client::DebugClient;
use crate::frame::FrameView;
use crate::session::{SessionState, StopLine};

/// Compiled fnmatch-style patterns over source-unit identities.
#[derive(Debug, Default)]
pub struct SkipRules {
    patterns: Vec<Pattern>,
}

impl SkipRules {
    /// Compile a pattern list. Malformed patterns are dropped with a
    /// warning rather than failing the session.
    #[must_use]
    pub fn new(patterns: &[SmolStr]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|raw| match Pattern::new(raw) {
                Ok(pattern) => Some(pattern),
                Err(err) => {
                    warn!(pattern = %raw, %err, "ignoring malformed skip pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// Whether no pattern is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether `unit` matches any pattern.
    #[must_use]
    pub fn matches(&self, unit: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(unit))
    }
}

/// Decides whether execution must halt at the current frame.
///
/// Cheap by construction: this check runs first on every line and exception
/// event, before any breakpoint lookup.
#[derive(Debug, Default)]
pub struct StopPolicy {
    skip: SkipRules,
}

impl StopPolicy {
    /// A policy with the given skip rules.
    #[must_use]
    pub fn new(skip: SkipRules) -> Self {
        Self { skip }
    }

    /// Skip rules, for front ends that share them.
    #[must_use]
    pub fn skip_rules(&self) -> &SkipRules {
        &self.skip
    }

    /// The stop decision: not skipped, in the stop frame (or no stop frame
    /// designated), and at or past the line threshold.
    ///
    /// The skipped-unit override is consulted only when skip rules are
    /// configured, keeping the no-skip fast path free of a virtual call.
    pub(crate) fn stop_here<C: DebugClient>(
        &self,
        client: &C,
        session: &SessionState,
        frame: FrameView<'_>,
    ) -> bool {
        if !self.skip.is_empty()
            && (self.skip.matches(frame.source_unit()) || client.is_skipped_unit(frame))
        {
            return false;
        }
        if session.stopframe.is_none() || session.stopframe == Some(frame.id()) {
            return match session.stop_line {
                StopLine::Never => false,
                StopLine::Any => true,
                StopLine::AtOrAfter(target) => frame.line() >= target,
            };
        }
        false
    }
}
