mod common;

use std::sync::Mutex;

use common::{NullClient, TestHost, TestStack};
use steptrace_attach::{attach_state, AttachError, AttachRequest, AttachSession, AttachState};
use steptrace_engine::{EventDispatcher, TracerConfig};

// The attach state machine is process-wide; these tests serialize on it.
static GUARD: Mutex<()> = Mutex::new(());

fn bootstrap(
    host: &mut TestHost,
    stack: &mut TestStack,
) -> Result<AttachSession<TestHost, NullClient>, AttachError> {
    let target = stack.push("worker.src", 1, None);
    AttachSession::bootstrap(
        host,
        stack,
        target,
        &AttachRequest::default(),
        &TracerConfig::default(),
        |_context, _request| Ok(NullClient),
    )
}

#[test]
fn overlapping_attaches_are_rejected_until_detach() {
    let _guard = GUARD.lock().unwrap_or_else(|err| err.into_inner());
    common::init_logging();

    let mut host = TestHost::ready();
    let mut stack = TestStack::new();
    assert_eq!(attach_state(), AttachState::Idle);

    let first = bootstrap(&mut host, &mut stack).expect("first attach");
    assert_eq!(attach_state(), AttachState::Attached);
    assert_eq!(host.thread_hook, Some(first.dispatcher().hook()));

    // A second session while the first is live is rejected outright.
    let second = bootstrap(&mut host, &mut stack);
    assert!(matches!(second, Err(AttachError::AlreadyAttached)));
    assert_eq!(attach_state(), AttachState::Attached);

    first.detach(&mut host, &mut stack);
    assert_eq!(attach_state(), AttachState::Idle);
    assert_eq!(host.thread_hook, None);
    assert_eq!(host.contexts_destroyed, 1);

    // After detach a fresh request succeeds again.
    let third = bootstrap(&mut host, &mut stack).expect("attach after detach");
    third.detach(&mut host, &mut stack);
    assert_eq!(attach_state(), AttachState::Idle);
    assert_eq!(host.contexts_created, host.contexts_destroyed);
}

#[test]
fn detach_restores_a_pre_attach_hook_exactly() {
    let _guard = GUARD.lock().unwrap_or_else(|err| err.into_inner());

    let mut host = TestHost::ready();
    let mut stack = TestStack::new();

    // Some earlier tool owns the thread hook before attach.
    let owner: EventDispatcher<NullClient> =
        EventDispatcher::new(&TracerConfig::default(), NullClient);
    host.thread_hook = Some(owner.hook());

    let session = bootstrap(&mut host, &mut stack).expect("attach");
    assert_eq!(session.previous_hook(), Some(owner.hook()));
    assert_eq!(host.thread_hook, Some(session.dispatcher().hook()));

    session.detach(&mut host, &mut stack);
    assert_eq!(host.thread_hook, Some(owner.hook()));
}

#[test]
fn precondition_failures_leave_no_state_behind() {
    let _guard = GUARD.lock().unwrap_or_else(|err| err.into_inner());

    let mut stack = TestStack::new();

    let mut host = TestHost::default(); // not ready
    let result = bootstrap(&mut host, &mut stack);
    assert!(matches!(result, Err(AttachError::RuntimeNotReady)));
    assert_eq!(attach_state(), AttachState::Idle);
    assert_eq!(host.contexts_created, 0);

    let mut host = TestHost::ready();
    host.tool = Some("alloc-profiler".to_owned());
    let result = bootstrap(&mut host, &mut stack);
    assert!(matches!(result, Err(AttachError::ToolConflict(_))));
    assert_eq!(attach_state(), AttachState::Idle);
    assert_eq!(host.contexts_created, 0);
    assert_eq!(host.thread_hook, None);
}

#[test]
fn context_construction_failure_aborts_cleanly() {
    let _guard = GUARD.lock().unwrap_or_else(|err| err.into_inner());

    let mut host = TestHost::ready();
    host.fail_context = true;
    let mut stack = TestStack::new();

    let result = bootstrap(&mut host, &mut stack);
    assert!(matches!(result, Err(AttachError::ContextSetup(_))));
    assert_eq!(attach_state(), AttachState::Idle);
    assert_eq!(host.thread_hook, None);
}

#[test]
fn client_setup_failure_destroys_the_context() {
    let _guard = GUARD.lock().unwrap_or_else(|err| err.into_inner());

    let mut host = TestHost::ready();
    let mut stack = TestStack::new();
    let target = stack.push("worker.src", 1, None);

    let result: Result<AttachSession<TestHost, NullClient>, AttachError> =
        AttachSession::bootstrap(
            &mut host,
            &mut stack,
            target,
            &AttachRequest::default(),
            &TracerConfig::default(),
            |_context, _request| Err("transport refused".into()),
        );

    assert!(matches!(result, Err(AttachError::ClientSetup(_))));
    assert_eq!(host.contexts_created, 1);
    assert_eq!(host.contexts_destroyed, 1);
    assert_eq!(attach_state(), AttachState::Idle);
    assert_eq!(host.thread_hook, None);
}
