#![allow(dead_code)]

use std::collections::VecDeque;

use steptrace_engine::{
    BreakpointHits, BreakpointId, ClientError, DebugClient, FrameId, FrameModel, FrameView,
    HookHandle, Resume, SessionControl,
};

/// Initialize test logging once; `RUST_LOG` selects the filter.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

#[derive(Debug)]
struct FrameData {
    unit: String,
    entry_line: u32,
    line: u32,
    caller: Option<FrameId>,
    hook: Option<HookHandle>,
}

/// A scripted host call stack the tests drive by hand.
#[derive(Debug, Default)]
pub struct ScriptedStack {
    frames: Vec<FrameData>,
}

impl ScriptedStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a frame; the returned id stays valid for the whole test.
    pub fn push(&mut self, unit: &str, entry_line: u32, caller: Option<FrameId>) -> FrameId {
        let id = FrameId(self.frames.len() as u64);
        self.frames.push(FrameData {
            unit: unit.to_owned(),
            entry_line,
            line: entry_line,
            caller,
            hook: None,
        });
        id
    }

    pub fn set_line(&mut self, frame: FrameId, line: u32) {
        self.frames[frame.0 as usize].line = line;
    }

    pub fn hook_of(&self, frame: FrameId) -> Option<HookHandle> {
        self.frames[frame.0 as usize].hook
    }
}

impl FrameModel for ScriptedStack {
    fn source_unit(&self, frame: FrameId) -> &str {
        &self.frames[frame.0 as usize].unit
    }

    fn entry_line(&self, frame: FrameId) -> u32 {
        self.frames[frame.0 as usize].entry_line
    }

    fn current_line(&self, frame: FrameId) -> u32 {
        self.frames[frame.0 as usize].line
    }

    fn caller(&self, frame: FrameId) -> Option<FrameId> {
        self.frames[frame.0 as usize].caller
    }

    fn frame_hook(&self, frame: FrameId) -> Option<HookHandle> {
        self.frames[frame.0 as usize].hook
    }

    fn install_frame_hook(&mut self, frame: FrameId, hook: HookHandle) {
        self.frames[frame.0 as usize].hook = Some(hook);
    }

    fn clear_frame_hook(&mut self, frame: FrameId) {
        self.frames[frame.0 as usize].hook = None;
    }
}

/// Everything the recording client observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Call(FrameId),
    Line(FrameId, u32),
    Breakpoints(FrameId, u32, Vec<BreakpointId>),
    Return(FrameId, i32),
    Exception(FrameId, i32),
    StopTracing(Option<FrameId>),
}

/// A front end that records every callback and answers from a scripted
/// plan of resume requests (`Unchanged` once the plan runs dry).
#[derive(Debug, Default)]
pub struct RecordingClient {
    pub seen: Vec<Seen>,
    pub plan: VecDeque<Resume>,
    pub fail_next: bool,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(plan: impl IntoIterator<Item = Resume>) -> Self {
        Self {
            plan: plan.into_iter().collect(),
            ..Self::default()
        }
    }

    fn answer(&mut self) -> Result<Resume, ClientError> {
        if self.fail_next {
            self.fail_next = false;
            return Err("scripted callback failure".into());
        }
        Ok(self.plan.pop_front().unwrap_or(Resume::Unchanged))
    }
}

impl DebugClient for RecordingClient {
    type Value = i32;

    fn user_call(
        &mut self,
        _ctl: &mut SessionControl<'_>,
        frame: FrameId,
    ) -> Result<Resume, ClientError> {
        self.seen.push(Seen::Call(frame));
        self.answer()
    }

    fn user_line(
        &mut self,
        ctl: &mut SessionControl<'_>,
        frame: FrameId,
    ) -> Result<Resume, ClientError> {
        let line = ctl.line(frame);
        self.seen.push(Seen::Line(frame, line));
        self.answer()
    }

    fn user_breakpoints(
        &mut self,
        ctl: &mut SessionControl<'_>,
        frame: FrameId,
        hits: &BreakpointHits,
    ) -> Result<Resume, ClientError> {
        self.seen
            .push(Seen::Breakpoints(frame, ctl.line(frame), hits.ids()));
        hits.for_each_mut(|bp| bp.hits += 1);
        self.answer()
    }

    fn user_return(
        &mut self,
        _ctl: &mut SessionControl<'_>,
        frame: FrameId,
        value: &i32,
    ) -> Result<Resume, ClientError> {
        self.seen.push(Seen::Return(frame, *value));
        self.answer()
    }

    fn user_exception(
        &mut self,
        _ctl: &mut SessionControl<'_>,
        frame: FrameId,
        exc: &i32,
    ) -> Result<Resume, ClientError> {
        self.seen.push(Seen::Exception(frame, *exc));
        self.answer()
    }

    fn is_skipped_unit(&self, _frame: FrameView<'_>) -> bool {
        false
    }

    fn stop_tracing(&mut self, frame: Option<FrameId>) {
        self.seen.push(Seen::StopTracing(frame));
    }
}
