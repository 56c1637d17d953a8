//! Host call-stack abstraction.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of one activation record on the debugged call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

/// Handle under which a dispatcher is installed, stored in per-frame hook
/// slots and in the thread-wide hook slot.
///
/// Hooks reference their dispatcher by handle only; the dispatcher never
/// appears as its own strongly-owned hook, so no ownership cycle can form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(u64);

impl HookHandle {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Cap on caller-chain walks. A chain longer than this is treated as
/// malformed host state rather than walked forever.
pub(crate) const MAX_FRAME_WALK: usize = 1 << 20;

/// Host view over the debugged call stack.
///
/// Frames are owned by the host. The engine keeps [`FrameId`] handles only,
/// and of those just the session botframe outlives the event that delivered
/// it.
pub trait FrameModel {
    /// Raw source-unit identity of the code unit `frame` executes.
    fn source_unit(&self, frame: FrameId) -> &str;

    /// First line of the code unit, identifying the unit within its source.
    fn entry_line(&self, frame: FrameId) -> u32;

    /// Line currently executing in `frame`.
    fn current_line(&self, frame: FrameId) -> u32;

    /// The frame that called `frame`, if any.
    fn caller(&self, frame: FrameId) -> Option<FrameId>;

    /// Hook currently installed in the per-frame slot of `frame`.
    fn frame_hook(&self, frame: FrameId) -> Option<HookHandle>;

    /// Install a line-level hook in the slot of `frame`.
    fn install_frame_hook(&mut self, frame: FrameId, hook: HookHandle);

    /// Clear the hook slot of `frame`.
    fn clear_frame_hook(&mut self, frame: FrameId);
}

/// Read-only view of one frame, valid for the duration of an event.
#[derive(Clone, Copy)]
pub struct FrameView<'a> {
    stack: &'a dyn FrameModel,
    frame: FrameId,
}

impl<'a> FrameView<'a> {
    pub(crate) fn new(stack: &'a dyn FrameModel, frame: FrameId) -> Self {
        Self { stack, frame }
    }

    /// Frame identity.
    #[must_use]
    pub fn id(&self) -> FrameId {
        self.frame
    }

    /// Source-unit identity of the executing code unit.
    #[must_use]
    pub fn source_unit(&self) -> &'a str {
        self.stack.source_unit(self.frame)
    }

    /// Entry line of the executing code unit.
    #[must_use]
    pub fn entry_line(&self) -> u32 {
        self.stack.entry_line(self.frame)
    }

    /// Line currently executing.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.stack.current_line(self.frame)
    }

    /// Caller frame, if any.
    #[must_use]
    pub fn caller(&self) -> Option<FrameId> {
        self.stack.caller(self.frame)
    }
}

impl fmt::Debug for FrameView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameView")
            .field("frame", &self.frame)
            .field("unit", &self.source_unit())
            .field("line", &self.line())
            .finish()
    }
}
