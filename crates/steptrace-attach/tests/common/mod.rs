#![allow(dead_code)]

use steptrace_engine::{
    ClientError, DebugClient, FrameId, FrameModel, FrameView, HookHandle, Resume, SessionControl,
};
use steptrace_attach::AttachHost;

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

/// A minimal host call stack for driving the bootstrap.
#[derive(Debug, Default)]
pub struct TestStack {
    frames: Vec<FrameData>,
}

impl TestStack {
    pub fn new() -> Self {
        Self::default()
    }

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

    pub fn hook_of(&self, frame: FrameId) -> Option<HookHandle> {
        self.frames[frame.0 as usize].hook
    }
}

impl FrameModel for TestStack {
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

/// A front end that never interacts; enough to host a dispatcher.
#[derive(Debug, Default)]
pub struct NullClient;

impl DebugClient for NullClient {
    type Value = ();

    fn user_line(
        &mut self,
        _ctl: &mut SessionControl<'_>,
        _frame: FrameId,
    ) -> Result<Resume, ClientError> {
        Ok(Resume::Continue)
    }

    fn is_skipped_unit(&self, _frame: FrameView<'_>) -> bool {
        false
    }

    fn stop_tracing(&mut self, _frame: Option<FrameId>) {}
}

/// One fake isolated context.
#[derive(Debug, PartialEq, Eq)]
pub struct TestContext {
    pub id: usize,
}

/// A scripted attach host.
#[derive(Debug, Default)]
pub struct TestHost {
    pub ready: bool,
    pub tool: Option<String>,
    pub thread_hook: Option<HookHandle>,
    pub contexts_created: usize,
    pub contexts_destroyed: usize,
    pub fail_context: bool,
}

impl TestHost {
    pub fn ready() -> Self {
        Self {
            ready: true,
            ..Self::default()
        }
    }
}

impl AttachHost for TestHost {
    type Context = TestContext;
    type Error = std::io::Error;

    fn runtime_ready(&self) -> bool {
        self.ready
    }

    fn conflicting_tool(&self) -> Option<&str> {
        self.tool.as_deref()
    }

    fn thread_hook(&self) -> Option<HookHandle> {
        self.thread_hook
    }

    fn install_thread_hook(&mut self, hook: HookHandle) {
        self.thread_hook = Some(hook);
    }

    fn clear_thread_hook(&mut self) {
        self.thread_hook = None;
    }

    fn create_context(&mut self) -> Result<TestContext, std::io::Error> {
        if self.fail_context {
            return Err(std::io::Error::other("context construction refused"));
        }
        self.contexts_created += 1;
        Ok(TestContext {
            id: self.contexts_created,
        })
    }

    fn destroy_context(&mut self, _context: TestContext) {
        self.contexts_destroyed += 1;
    }
}
