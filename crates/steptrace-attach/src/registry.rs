//! Process-wide signal registration and request handoff.
//!
//! The signal handler never executes runtime logic: it sets an atomic
//! pending flag, and the target thread drains it at its next safe
//! scheduling point with [`take_pending`]. Explicit requests go through a
//! bounded channel; when the queue is full or the registry is busy the
//! request is silently dropped - a dropped attach request is simply
//! retried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crossbeam_channel::{bounded, Receiver, Sender};
use signal_hook::SigId;
use smol_str::SmolStr;
use tracing::{debug, trace};

use crate::config::{AttachRequest, DEFAULT_HOST, DEFAULT_PORT};
use crate::error::AttachError;

/// Default attach trigger signal.
pub const DEFAULT_SIGNAL: i32 = signal_hook::consts::SIGUSR1;

/// One registered out-of-band attach trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Transport host handed to the bootstrapped session.
    pub host: SmolStr,
    /// Transport port handed to the bootstrapped session.
    pub port: u16,
    /// Signal number that raises the pending flag.
    pub signum: i32,
}

struct ActiveRegistration {
    registration: Registration,
    sig_id: SigId,
    pending: Arc<AtomicBool>,
}

struct RegistryState {
    active: Option<ActiveRegistration>,
    request_tx: Sender<AttachRequest>,
    request_rx: Receiver<AttachRequest>,
}

fn registry() -> &'static Mutex<RegistryState> {
    static REGISTRY: OnceLock<Mutex<RegistryState>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let (request_tx, request_rx) = bounded(1);
        Mutex::new(RegistryState {
            active: None,
            request_tx,
            request_rx,
        })
    })
}

/// Register the attach trigger for `signum`.
///
/// Only one registration is active at a time. Re-registering with the same
/// signal number just replaces the transport address; a new signal number
/// restores the previous signal disposition first.
pub fn register(host: Option<&str>, port: Option<u16>, signum: i32) -> Result<(), AttachError> {
    let host = SmolStr::from(host.unwrap_or(DEFAULT_HOST));
    let port = port.unwrap_or(DEFAULT_PORT);

    let mut state = registry().lock().expect("attach registry poisoned");
    if let Some(mut active) = state.active.take() {
        if active.registration.signum == signum {
            active.registration.host = host;
            active.registration.port = port;
            state.active = Some(active);
            return Ok(());
        }
        signal_hook::low_level::unregister(active.sig_id);
    }

    let pending = Arc::new(AtomicBool::new(false));
    let sig_id = signal_hook::flag::register(signum, Arc::clone(&pending))
        .map_err(|source| AttachError::Signal { signum, source })?;
    debug!(signum, %host, port, "attach trigger registered");
    state.active = Some(ActiveRegistration {
        registration: Registration { host, port, signum },
        sig_id,
        pending,
    });
    Ok(())
}

/// Remove the attach trigger and restore the prior signal disposition.
/// Does nothing when no trigger is registered.
pub fn unregister() {
    let mut state = registry().lock().expect("attach registry poisoned");
    if let Some(active) = state.active.take() {
        signal_hook::low_level::unregister(active.sig_id);
        debug!(signum = active.registration.signum, "attach trigger unregistered");
    }
}

/// The active registration, if any.
#[must_use]
pub fn registered() -> Option<Registration> {
    let state = registry().lock().expect("attach registry poisoned");
    state.active.as_ref().map(|active| active.registration.clone())
}

/// Queue an explicit attach request. Silently dropped when the queue is
/// full or the registry lock is contended; the caller retries.
pub fn request_attach(request: AttachRequest) {
    let Ok(state) = registry().try_lock() else {
        trace!("attach request dropped: registry busy");
        return;
    };
    if state.request_tx.try_send(request).is_err() {
        trace!("attach request dropped: queue full");
    }
}

/// Drain the pending attach trigger at a safe scheduling point on the
/// target thread. Signal-raised requests carry the registered transport
/// address.
#[must_use]
pub fn take_pending() -> Option<AttachRequest> {
    let state = registry().lock().expect("attach registry poisoned");
    if let Some(active) = &state.active {
        if active.pending.swap(false, Ordering::AcqRel) {
            return Some(AttachRequest {
                host: active.registration.host.clone(),
                port: active.registration.port,
            });
        }
    }
    state.request_rx.try_recv().ok()
}
