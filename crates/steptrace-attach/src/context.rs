//! Isolated execution context ownership.

use drop_bomb::DropBomb;

use crate::bootstrap::AttachHost;

/// Owning handle for a host isolated execution context.
///
/// The context shares no implicit mutable global state with the host's
/// primary context; the attach session is its sole owner and the only code
/// that may tear it down. The handle must go through
/// [`teardown`](Self::teardown) on every exit path - dropping it armed is a
/// bug in the attach machinery, not a recoverable condition.
#[derive(Debug)]
pub struct IsolatedContext<T> {
    inner: Option<T>,
    bomb: DropBomb,
}

impl<T> IsolatedContext<T> {
    pub(crate) fn new(inner: T) -> Self {
        Self {
            inner: Some(inner),
            bomb: DropBomb::new("isolated context dropped without teardown"),
        }
    }

    /// The host context.
    #[must_use]
    pub fn get(&self) -> &T {
        self.inner.as_ref().expect("context already torn down")
    }

    /// The host context, write side.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.as_mut().expect("context already torn down")
    }

    /// Destroy the context through the host capability.
    pub(crate) fn teardown<H>(mut self, host: &mut H)
    where
        H: AttachHost<Context = T> + ?Sized,
    {
        self.bomb.defuse();
        if let Some(inner) = self.inner.take() {
            host.destroy_context(inner);
        }
    }
}
