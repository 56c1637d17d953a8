//! Event dispatch state machine.

use smol_str::SmolStr;
use tracing::warn;

use crate::breakpoints::{BreakpointHits, BreakpointId, BreakpointIndex};
use crate::client::{ClientError, DebugClient, Resume};
use crate::config::{SkipCall, TracerConfig};
use crate::error::TraceError;
use crate::frame::{FrameId, FrameModel, FrameView, HookHandle, MAX_FRAME_WALK};
use crate::optimizer::{InstrumentationLevel, InstrumentationOptimizer};
use crate::policy::{SkipRules, StopPolicy};
use crate::session::{SessionState, StopLine};
use crate::trace::{trace_dispatch, trace_enabled};

/// One control-flow event delivered by the host.
#[derive(Debug)]
pub enum TraceEvent<'a, V> {
    /// Execution entered a new frame.
    Call,
    /// Execution reached a new line in the current frame.
    Line,
    /// The current frame is returning with a value.
    Return(&'a V),
    /// An exception was raised in the current frame.
    Exception(&'a V),
}

/// What the host must do with the instrumentation of the current frame.
///
/// `KeepInstalled` means "keep (or install) this dispatcher's hook in the
/// frame's slot"; the handle is available from
/// [`EventDispatcher::hook`]. Fatal conditions are reported through
/// [`TraceError`], not through the directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Keep delivering line-level events for this frame.
    KeepInstalled,
    /// Stop delivering line-level events for this frame.
    Uninstall,
}

enum UserEvent<'a, V> {
    Call,
    Line,
    Breakpoints(BreakpointHits),
    Return(&'a V),
    Exception(&'a V),
}

/// Engine surface available to callbacks while execution is stopped.
///
/// Stepping is requested through the callback's [`Resume`] return value;
/// breakpoint edits, frame inspection and session state go through this
/// handle.
pub struct SessionControl<'a> {
    stack: &'a mut dyn FrameModel,
    breakpoints: &'a mut BreakpointIndex,
    session: &'a mut SessionState,
    hook: HookHandle,
}

impl SessionControl<'_> {
    /// Source-unit identity of the code unit executing in `frame`.
    #[must_use]
    pub fn source_unit(&self, frame: FrameId) -> &str {
        self.stack.source_unit(frame)
    }

    /// Entry line of the code unit executing in `frame`.
    #[must_use]
    pub fn entry_line(&self, frame: FrameId) -> u32 {
        self.stack.entry_line(frame)
    }

    /// Line currently executing in `frame`.
    #[must_use]
    pub fn line(&self, frame: FrameId) -> u32 {
        self.stack.current_line(frame)
    }

    /// Caller of `frame`, if any.
    #[must_use]
    pub fn caller(&self, frame: FrameId) -> Option<FrameId> {
        self.stack.caller(frame)
    }

    /// Session bookkeeping, read side.
    #[must_use]
    pub fn session(&self) -> &SessionState {
        self.session
    }

    /// Breakpoint store, read side.
    #[must_use]
    pub fn breakpoints(&self) -> &BreakpointIndex {
        self.breakpoints
    }

    /// Breakpoint store, write side.
    pub fn breakpoints_mut(&mut self) -> &mut BreakpointIndex {
        self.breakpoints
    }

    /// Set a breakpoint and hook any live frame already executing that code
    /// unit, so the breakpoint is reachable without waiting for a fresh
    /// call event.
    pub fn set_break(&mut self, unit: &str, entry_line: u32, line: u32) -> BreakpointId {
        let id = self.breakpoints.set_break(unit, entry_line, line);
        let canon = self.breakpoints.canonical_unit(unit);
        let mut cursor = self.session.topframe;
        let mut steps = 0_usize;
        while let Some(frame) = cursor {
            if self.stack.entry_line(frame) == entry_line
                && self.breakpoints.canonical_unit(self.stack.source_unit(frame)) == canon
                && self.stack.frame_hook(frame).is_none()
            {
                self.stack.install_frame_hook(frame, self.hook);
            }
            if Some(frame) == self.session.botframe {
                break;
            }
            steps += 1;
            if steps > MAX_FRAME_WALK {
                break;
            }
            cursor = self.stack.caller(frame);
        }
        id
    }

    /// Delete one breakpoint.
    pub fn clear_breakpoint(&mut self, id: BreakpointId) -> bool {
        self.breakpoints.clear_breakpoint(id)
    }

    /// Delete every breakpoint.
    pub fn clear_all_breaks(&mut self) {
        self.breakpoints.clear_all_breaks();
    }
}

/// The per-event decision engine.
///
/// The host calls [`dispatch`](Self::dispatch) for every control-flow event
/// on the instrumented thread; the front end is called back at user-visible
/// stops and answers with a [`Resume`] request.
pub struct EventDispatcher<C: DebugClient> {
    client: C,
    session: SessionState,
    breakpoints: BreakpointIndex,
    policy: StopPolicy,
    optimizer: InstrumentationOptimizer,
    skip_calls: Vec<SkipCall>,
    hook: HookHandle,
    trace_active: bool,
}

impl<C: DebugClient> EventDispatcher<C> {
    /// Build a dispatcher from configuration and an injected front end.
    pub fn new(config: &TracerConfig, client: C) -> Self {
        Self {
            client,
            session: SessionState::new(),
            breakpoints: BreakpointIndex::new(config.fold_unit_case),
            policy: StopPolicy::new(SkipRules::new(&config.skip_units)),
            optimizer: InstrumentationOptimizer::new(config.optimize_instrumentation),
            skip_calls: config.skip_calls.clone(),
            hook: HookHandle::next(),
            trace_active: false,
        }
    }

    /// Handle this dispatcher is installed under.
    #[must_use]
    pub fn hook(&self) -> HookHandle {
        self.hook
    }

    /// Current thread-wide delivery granularity. The host re-reads this
    /// after every call/return dispatch.
    #[must_use]
    pub fn instrumentation_level(&self) -> InstrumentationLevel {
        self.optimizer.level()
    }

    /// Session bookkeeping, read side.
    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Breakpoint store, read side.
    #[must_use]
    pub fn breakpoints(&self) -> &BreakpointIndex {
        &self.breakpoints
    }

    /// The injected front end.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The injected front end, write side.
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// Enable or disable event delivery for the thread.
    pub fn settrace(&mut self, active: bool) {
        self.trace_active = active;
    }

    /// Whether the dispatcher is receiving events.
    #[must_use]
    pub fn gettrace(&self) -> bool {
        self.trace_active
    }

    /// Reset the session for a new debugged call chain.
    pub fn reset(&mut self, ignore_first_call: bool, botframe: Option<FrameId>) {
        self.session.reset(ignore_first_call, botframe);
    }

    /// Whether execution must halt at `frame` right now.
    #[must_use]
    pub fn stop_here(&self, stack: &dyn FrameModel, frame: FrameId) -> bool {
        self.policy
            .stop_here(&self.client, &self.session, FrameView::new(stack, frame))
    }

    /// Decide the outcome of one host event.
    ///
    /// `Uninstall` asks the host to drop line-level delivery for this frame.
    /// `Err(TraceError::Quit)` asks the host to unwind the debugged call
    /// chain; any other error is fatal and instrumentation is already
    /// disabled when it is returned.
    pub fn dispatch(
        &mut self,
        stack: &mut dyn FrameModel,
        frame: FrameId,
        event: TraceEvent<'_, C::Value>,
    ) -> Result<Directive, TraceError> {
        if !self.trace_active {
            return Ok(Directive::Uninstall);
        }
        match event {
            TraceEvent::Line => self.dispatch_line(stack, frame),
            TraceEvent::Call => self.dispatch_call(stack, frame),
            TraceEvent::Return(value) => self.dispatch_return(stack, frame, value),
            TraceEvent::Exception(exc) => self.dispatch_exception(stack, frame, exc),
        }
    }

    fn dispatch_line(
        &mut self,
        stack: &mut dyn FrameModel,
        frame: FrameId,
    ) -> Result<Directive, TraceError> {
        // The stop policy is cheaper than breakpoint resolution; check it
        // first.
        if self.stop_here(&*stack, frame) {
            return self.invoke_user(stack, frame, UserEvent::Line);
        }
        let hits = {
            let view = FrameView::new(&*stack, frame);
            let unit = view.source_unit();
            let entry_line = view.entry_line();
            let line = view.line();
            self.breakpoints.resolve_line(unit, entry_line, line)
        };
        if let Some(hits) = hits {
            return self.invoke_user(stack, frame, UserEvent::Breakpoints(hits));
        }
        Ok(Directive::KeepInstalled)
    }

    fn dispatch_call(
        &mut self,
        stack: &mut dyn FrameModel,
        frame: FrameId,
    ) -> Result<Directive, TraceError> {
        if self.session.ignore_first_call {
            self.session.ignore_first_call = false;
            return Ok(Directive::KeepInstalled);
        }
        {
            let view = FrameView::new(&*stack, frame);
            if self.skip_calls.iter().any(|skip| {
                skip.entry_line == view.entry_line() && skip.unit == view.source_unit()
            }) {
                return Ok(Directive::Uninstall);
            }
        }
        let stop = self.stop_here(&*stack, frame);
        let interested = stop || {
            let view = FrameView::new(&*stack, frame);
            let unit = view.source_unit();
            let entry_line = view.entry_line();
            self.breakpoints.unit_has_breakpoints(unit, entry_line)
        };
        if !interested {
            // Nothing to watch in this frame; drop it, and the whole thread
            // when no other frame needs line delivery.
            self.optimizer.reevaluate(&*stack, Some(frame), &self.session);
            return Ok(Directive::Uninstall);
        }
        self.optimizer.promote();
        if stop {
            return self.invoke_user(stack, frame, UserEvent::Call);
        }
        // A breakpoint lives in this unit: keep line delivery, no callback.
        Ok(Directive::KeepInstalled)
    }

    fn dispatch_return(
        &mut self,
        stack: &mut dyn FrameModel,
        frame: FrameId,
        value: &C::Value,
    ) -> Result<Directive, TraceError> {
        let stop = self.stop_here(&*stack, frame) || self.session.stopframe == Some(frame);
        if stop {
            let directive = self.invoke_user(stack, frame, UserEvent::Return(value))?;
            if directive == Directive::Uninstall {
                return Ok(Directive::Uninstall);
            }
            // Control is returning past the step target: the caller regains
            // line-level visibility and the step state resets to "stop at
            // next line in caller".
            let resets_step = self.session.stopframe == Some(frame)
                || (self.session.stopframe.is_none() && self.session.stop_line == StopLine::Any);
            if Some(frame) != self.session.botframe && resets_step {
                if let Some(caller) = stack.caller(frame) {
                    if stack.frame_hook(caller).is_none() {
                        stack.install_frame_hook(caller, self.hook);
                    }
                }
                self.session.stopframe = None;
                self.session.stop_line = StopLine::Any;
                self.optimizer.promote();
            }
        }
        if Some(frame) == self.session.botframe {
            // The bottom frame ending means the debugged call chain has
            // unwound completely.
            if trace_enabled() {
                trace_dispatch(&format!("botframe {frame:?} returned, session over"));
            }
            self.client.stop_tracing(Some(frame));
            self.uninstall_all(stack, Some(frame));
            return Ok(Directive::Uninstall);
        }
        self.optimizer
            .reevaluate(&*stack, stack.caller(frame), &self.session);
        Ok(Directive::KeepInstalled)
    }

    fn dispatch_exception(
        &mut self,
        stack: &mut dyn FrameModel,
        frame: FrameId,
        exc: &C::Value,
    ) -> Result<Directive, TraceError> {
        if self.stop_here(&*stack, frame) {
            return self.invoke_user(stack, frame, UserEvent::Exception(exc));
        }
        Ok(Directive::KeepInstalled)
    }

    fn invoke_user(
        &mut self,
        stack: &mut dyn FrameModel,
        frame: FrameId,
        event: UserEvent<'_, C::Value>,
    ) -> Result<Directive, TraceError> {
        if self.session.botframe.is_none() {
            // First stop of the session: this frame anchors the call chain.
            self.session.botframe = Some(frame);
        }
        self.session.topframe = Some(frame);
        let outcome = {
            let mut ctl = SessionControl {
                stack: &mut *stack,
                breakpoints: &mut self.breakpoints,
                session: &mut self.session,
                hook: self.hook,
            };
            match event {
                UserEvent::Call => self.client.user_call(&mut ctl, frame),
                UserEvent::Line => self.client.user_line(&mut ctl, frame),
                UserEvent::Breakpoints(hits) => {
                    self.client.user_breakpoints(&mut ctl, frame, &hits)
                }
                UserEvent::Return(value) => self.client.user_return(&mut ctl, frame, value),
                UserEvent::Exception(exc) => self.client.user_exception(&mut ctl, frame, exc),
            }
        };
        match outcome {
            Ok(resume) => {
                let applied = self.apply_resume(stack, frame, resume);
                self.session.topframe = None;
                applied?;
                self.directive(&*stack)
            }
            Err(source) => {
                self.session.topframe = None;
                Err(self.fatal(stack, frame, source))
            }
        }
    }

    fn apply_resume(
        &mut self,
        stack: &mut dyn FrameModel,
        frame: FrameId,
        resume: Resume,
    ) -> Result<(), TraceError> {
        if trace_enabled() {
            trace_dispatch(&format!("resume {resume:?} at {frame:?}"));
        }
        match resume {
            Resume::Unchanged => Ok(()),
            Resume::Step => self.set_step(stack),
            Resume::Next(target) => self.set_next(stack, target),
            Resume::Return(target) => self.set_return(stack, target),
            Resume::Until { frame: target, line } => self.set_until(stack, target, line),
            Resume::Continue => self.set_continue(stack),
            Resume::Quit => {
                self.set_quit(stack);
                Ok(())
            }
        }
    }

    /// Stop at the next line, wherever execution goes.
    pub fn set_step(&mut self, stack: &mut dyn FrameModel) -> Result<(), TraceError> {
        self.set_stopinfo(stack, None, StopLine::Any)
    }

    /// Stop at the next line in `frame` or below it.
    pub fn set_next(
        &mut self,
        stack: &mut dyn FrameModel,
        frame: FrameId,
    ) -> Result<(), TraceError> {
        self.set_stopinfo(stack, Some(frame), StopLine::Any)
    }

    /// Stop when returning from `frame`.
    pub fn set_return(
        &mut self,
        stack: &mut dyn FrameModel,
        frame: FrameId,
    ) -> Result<(), TraceError> {
        self.set_stopinfo(stack, Some(frame), StopLine::Never)
    }

    /// Stop in `frame` once the line reaches `line`, or on return from it.
    pub fn set_until(
        &mut self,
        stack: &mut dyn FrameModel,
        frame: FrameId,
        line: u32,
    ) -> Result<(), TraceError> {
        self.set_stopinfo(stack, Some(frame), StopLine::AtOrAfter(line))
    }

    /// Run until the next breakpoint; with no breakpoints set, drop all
    /// instrumentation so the debuggee runs at full speed.
    pub fn set_continue(&mut self, stack: &mut dyn FrameModel) -> Result<(), TraceError> {
        self.set_stopinfo(stack, None, StopLine::Never)?;
        if !self.breakpoints.any_breakpoints() {
            self.uninstall_all(stack, None);
        }
        Ok(())
    }

    /// End the session: stop delivering events and mark the session
    /// quitting, so the next directive asks the host to unwind.
    pub fn set_quit(&mut self, stack: &mut dyn FrameModel) {
        self.session.quitting = true;
        self.uninstall_all(stack, None);
    }

    /// Set a breakpoint from outside a callback, hooking live frames the
    /// same way the in-callback surface does.
    pub fn set_break(
        &mut self,
        stack: &mut dyn FrameModel,
        unit: &str,
        entry_line: u32,
        line: u32,
    ) -> BreakpointId {
        let mut ctl = SessionControl {
            stack,
            breakpoints: &mut self.breakpoints,
            session: &mut self.session,
            hook: self.hook,
        };
        ctl.set_break(unit, entry_line, line)
    }

    /// Delete one breakpoint.
    pub fn clear_breakpoint(&mut self, id: BreakpointId) -> bool {
        self.breakpoints.clear_breakpoint(id)
    }

    /// Delete every breakpoint.
    pub fn clear_all_breaks(&mut self) {
        self.breakpoints.clear_all_breaks();
    }

    /// Start debugging from `frame`: hook it and its caller chain, adopt
    /// the oldest frame as the botframe, reset the stepping state.
    pub fn attach_to(
        &mut self,
        stack: &mut dyn FrameModel,
        frame: FrameId,
    ) -> Result<(), TraceError> {
        // Delivery may already be live when attaching from inside a running
        // session; keep it off while the chain is rehooked.
        self.trace_active = false;
        stack.install_frame_hook(frame, self.hook);

        let ignore_first_call = self.session.ignore_first_call;
        let botframe = self.session.botframe;
        self.session.reset(ignore_first_call, botframe);
        self.session.topframe = Some(frame);

        let mut cursor = frame;
        let mut steps = 0_usize;
        loop {
            if Some(cursor) == self.session.botframe {
                break;
            }
            match stack.caller(cursor) {
                Some(parent) => {
                    steps += 1;
                    if steps > MAX_FRAME_WALK {
                        return Err(TraceError::FrameState("caller chain does not terminate"));
                    }
                    cursor = parent;
                }
                None => {
                    self.session.botframe = Some(cursor);
                    break;
                }
            }
        }
        // The bottom frame must stay hooked so chain termination is seen.
        if let Some(bot) = self.session.botframe {
            if stack.frame_hook(bot).is_none() {
                stack.install_frame_hook(bot, self.hook);
            }
        }
        if trace_enabled() {
            trace_dispatch(&format!(
                "attached at {frame:?}, botframe {:?}",
                self.session.botframe
            ));
        }
        self.trace_active = true;
        Ok(())
    }

    /// Stop delivering events and clear every frame hook from `from` (or
    /// the topframe) down to the botframe.
    pub fn stop_tracing(&mut self, stack: &mut dyn FrameModel, from: Option<FrameId>) {
        self.uninstall_all(stack, from);
    }

    fn set_stopinfo(
        &mut self,
        stack: &mut dyn FrameModel,
        stopframe: Option<FrameId>,
        stop_line: StopLine,
    ) -> Result<(), TraceError> {
        // Clamp the target into the [topframe, botframe] interval the
        // session actually spans.
        let mut target = stopframe;
        if let Some(want) = stopframe {
            let mut cursor = self.session.topframe;
            let mut steps = 0_usize;
            while let Some(frame) = cursor {
                if frame == want {
                    break;
                }
                if Some(frame) == self.session.botframe {
                    target = self.session.botframe;
                    break;
                }
                steps += 1;
                if steps > MAX_FRAME_WALK {
                    return Err(TraceError::FrameState(
                        "caller chain does not reach the botframe",
                    ));
                }
                cursor = stack.caller(frame);
            }
        }
        if let Some(frame) = target {
            if stack.frame_hook(frame).is_none() {
                stack.install_frame_hook(frame, self.hook);
            }
        }
        self.session.stopframe = target;
        self.session.stop_line = stop_line;
        Ok(())
    }

    fn directive(&mut self, stack: &dyn FrameModel) -> Result<Directive, TraceError> {
        if self.session.quitting
            && self
                .session
                .botframe
                .and_then(|frame| stack.caller(frame))
                .is_some()
        {
            return Err(TraceError::Quit);
        }
        if !self.trace_active {
            return Ok(Directive::Uninstall);
        }
        Ok(Directive::KeepInstalled)
    }

    fn fatal(
        &mut self,
        stack: &mut dyn FrameModel,
        frame: FrameId,
        source: ClientError,
    ) -> TraceError {
        let (unit, line) = {
            let view = FrameView::new(&*stack, frame);
            (SmolStr::from(view.source_unit()), view.line())
        };
        warn!(%unit, line, "debugger callback failed, disabling instrumentation");
        self.uninstall_all(stack, Some(frame));
        TraceError::Callback { unit, line, source }
    }

    fn uninstall_all(&mut self, stack: &mut dyn FrameModel, from: Option<FrameId>) {
        self.trace_active = false;
        let mut cursor = from.or(self.session.topframe).or(self.session.botframe);
        let mut steps = 0_usize;
        while let Some(frame) = cursor {
            stack.clear_frame_hook(frame);
            if Some(frame) == self.session.botframe {
                break;
            }
            steps += 1;
            if steps > MAX_FRAME_WALK {
                break;
            }
            cursor = stack.caller(frame);
        }
    }
}
