//! Attach session state machine and bootstrap.

use std::sync::atomic::{AtomicU8, Ordering};

use steptrace_engine::{
    DebugClient, EventDispatcher, FrameId, FrameModel, HookHandle, TracerConfig,
};
use tracing::{debug, warn};

use crate::config::AttachRequest;
use crate::context::IsolatedContext;
use crate::error::AttachError;

/// Observable phase of the process-wide attach machinery.
///
/// `Idle -> Bootstrapping -> Attached -> TearingDown -> Idle`; tearing down
/// is the only path back to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachState {
    /// No session exists.
    Idle,
    /// A bootstrap is running at a safe point.
    Bootstrapping,
    /// A session is live on the target thread.
    Attached,
    /// The session's context is being destroyed.
    TearingDown,
}

const IDLE: u8 = 0;
const BOOTSTRAPPING: u8 = 1;
const ATTACHED: u8 = 2;
const TEARING_DOWN: u8 = 3;

static STATE: AtomicU8 = AtomicU8::new(IDLE);

/// Current process-wide attach phase.
#[must_use]
pub fn attach_state() -> AttachState {
    match STATE.load(Ordering::Acquire) {
        BOOTSTRAPPING => AttachState::Bootstrapping,
        ATTACHED => AttachState::Attached,
        TEARING_DOWN => AttachState::TearingDown,
        _ => AttachState::Idle,
    }
}

fn claim_bootstrap() -> Result<(), AttachError> {
    STATE
        .compare_exchange(IDLE, BOOTSTRAPPING, Ordering::AcqRel, Ordering::Acquire)
        .map(|_| ())
        .map_err(|_| AttachError::AlreadyAttached)
}

/// Capabilities the host runtime provides for out-of-band attach.
pub trait AttachHost {
    /// Host representation of an isolated execution context.
    type Context;
    /// Context construction failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether the runtime finished bootstrapping and can host a session.
    fn runtime_ready(&self) -> bool;

    /// Name of an active instrumentation tool that cannot coexist with a
    /// debugger, if any.
    fn conflicting_tool(&self) -> Option<&str>;

    /// Hook currently installed on the target thread, if any.
    fn thread_hook(&self) -> Option<HookHandle>;

    /// Install `hook` as the target thread's hook.
    fn install_thread_hook(&mut self, hook: HookHandle);

    /// Clear the target thread's hook slot.
    fn clear_thread_hook(&mut self);

    /// Create a fresh isolated execution context sharing no implicit
    /// mutable state with the primary context.
    fn create_context(&mut self) -> Result<Self::Context, Self::Error>;

    /// Tear down a context created by
    /// [`create_context`](Self::create_context).
    fn destroy_context(&mut self, context: Self::Context);
}

/// One live attached session: the isolated context, the dispatcher spliced
/// onto the target thread, and the hook state to restore on detach.
///
/// At most one session exists process-wide. The session must end through
/// [`detach`](Self::detach) - the front end calls it when the session's
/// transport closes.
pub struct AttachSession<H: AttachHost, C: DebugClient> {
    context: IsolatedContext<H::Context>,
    dispatcher: EventDispatcher<C>,
    previous_hook: Option<HookHandle>,
}

impl<H: AttachHost, C: DebugClient> AttachSession<H, C> {
    /// Run the idle-to-attached transition at a safe scheduling point on
    /// the target thread.
    ///
    /// `client_factory` builds the session front end inside the fresh
    /// context, typically connecting the transport named by `request`.
    /// Every failure path tears the context down and leaves the target
    /// thread's original hook intact.
    pub fn bootstrap<F>(
        host: &mut H,
        stack: &mut dyn FrameModel,
        target: FrameId,
        request: &AttachRequest,
        config: &TracerConfig,
        client_factory: F,
    ) -> Result<Self, AttachError>
    where
        F: FnOnce(
            &mut H::Context,
            &AttachRequest,
        ) -> Result<C, Box<dyn std::error::Error + Send + Sync>>,
    {
        claim_bootstrap()?;
        match Self::bootstrap_inner(host, stack, target, request, config, client_factory) {
            Ok(session) => {
                STATE.store(ATTACHED, Ordering::Release);
                debug!(host = %request.host, port = request.port, "attach session live");
                Ok(session)
            }
            Err(err) => {
                STATE.store(IDLE, Ordering::Release);
                warn!(%err, "attach bootstrap failed");
                Err(err)
            }
        }
    }

    fn bootstrap_inner<F>(
        host: &mut H,
        stack: &mut dyn FrameModel,
        target: FrameId,
        request: &AttachRequest,
        config: &TracerConfig,
        client_factory: F,
    ) -> Result<Self, AttachError>
    where
        F: FnOnce(
            &mut H::Context,
            &AttachRequest,
        ) -> Result<C, Box<dyn std::error::Error + Send + Sync>>,
    {
        if !host.runtime_ready() {
            return Err(AttachError::RuntimeNotReady);
        }
        if let Some(tool) = host.conflicting_tool() {
            return Err(AttachError::ToolConflict(tool.into()));
        }
        let previous_hook = host.thread_hook();

        let mut context = match host.create_context() {
            Ok(context) => IsolatedContext::new(context),
            Err(err) => return Err(AttachError::ContextSetup(Box::new(err))),
        };
        let client = match client_factory(context.get_mut(), request) {
            Ok(client) => client,
            Err(err) => {
                context.teardown(host);
                return Err(AttachError::ClientSetup(err));
            }
        };

        let mut dispatcher = EventDispatcher::new(config, client);
        // The call event adjacent to the splice is absorbed without checks.
        dispatcher.reset(true, None);
        if let Err(err) = dispatcher.attach_to(stack, target) {
            context.teardown(host);
            return Err(AttachError::Engine(err));
        }
        host.install_thread_hook(dispatcher.hook());

        Ok(Self {
            context,
            dispatcher,
            previous_hook,
        })
    }

    /// The spliced-in dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &EventDispatcher<C> {
        &self.dispatcher
    }

    /// The spliced-in dispatcher, write side; the host routes the target
    /// thread's events here while attached.
    pub fn dispatcher_mut(&mut self) -> &mut EventDispatcher<C> {
        &mut self.dispatcher
    }

    /// The isolated context hosting the session.
    #[must_use]
    pub fn context(&self) -> &H::Context {
        self.context.get()
    }

    /// The isolated context, write side.
    pub fn context_mut(&mut self) -> &mut H::Context {
        self.context.get_mut()
    }

    /// Hook that owned the target thread before attach, if any.
    #[must_use]
    pub fn previous_hook(&self) -> Option<HookHandle> {
        self.previous_hook
    }

    /// Tear the session down: stop tracing, restore the pre-attach hook
    /// state exactly, destroy the isolated context, return to idle.
    pub fn detach(mut self, host: &mut H, stack: &mut dyn FrameModel) {
        STATE.store(TEARING_DOWN, Ordering::Release);
        self.dispatcher.stop_tracing(stack, None);
        match self.previous_hook {
            Some(hook) => host.install_thread_hook(hook),
            None => host.clear_thread_hook(),
        }
        self.context.teardown(host);
        STATE.store(IDLE, Ordering::Release);
        debug!("detached, pre-attach instrumentation restored");
    }
}
