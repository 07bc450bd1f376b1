//! Run a callable when a scope is left, on every exit path.
//!
//! Used by the multiplexers to restore their parent handle after a
//! cancellation sweep, and by task bodies for deterministic cleanup at
//! suspension points (the guard fires when a cancelled task's future is
//! dropped).

/// Calls `F` exactly once when dropped, unless [`dismiss`](Self::dismiss)ed.
///
/// The callable must not panic; it may run during unwinding.
#[must_use = "a scope guard runs its callable when dropped; bind it to a variable"]
pub struct ScopeGuard<F: FnOnce()> {
    f: Option<F>,
}

impl<F: FnOnce()> ScopeGuard<F> {
    /// Creates a guard that runs `f` on drop.
    pub const fn new(f: F) -> Self {
        Self { f: Some(f) }
    }

    /// Disarms the guard without running the callable.
    pub fn dismiss(mut self) {
        self.f = None;
    }
}

impl<F: FnOnce()> Drop for ScopeGuard<F> {
    fn drop(&mut self) {
        if let Some(f) = self.f.take() {
            f();
        }
    }
}

impl<F: FnOnce()> std::fmt::Debug for ScopeGuard<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("armed", &self.f.is_some())
            .finish()
    }
}

/// Shorthand for [`ScopeGuard::new`].
pub const fn scope_guard<F: FnOnce()>(f: F) -> ScopeGuard<F> {
    ScopeGuard::new(f)
}
