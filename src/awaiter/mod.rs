//! The awaiter protocol.
//!
//! Every suspendable object in the runtime implements [`Awaitable`]:
//!
//! - [`await_ready`](Awaitable::await_ready): may the resume path run without
//!   suspending?
//! - [`await_suspend`](Awaitable::await_suspend): install the parent handle
//!   and start the operation.
//! - [`await_resume`](Awaitable::await_resume): produce the value (or the
//!   error).
//!
//! and optionally the cancellation hooks
//! [`await_early_cancel`](Awaitable::await_early_cancel),
//! [`await_cancel`](Awaitable::await_cancel),
//! [`await_must_resume`](Awaitable::await_must_resume), plus
//! [`await_set_executor`](Awaitable::await_set_executor).
//!
//! The runtime never drives a user awaitable directly; it always goes through
//! [`Sanitized`], which normalizes the return of `await_suspend` and checks
//! the call order in debug builds.
//!
//! # Cancellation capabilities
//!
//! Three associated constants advertise guarantees that hold for every
//! instance of a type. Combinators fold them over their children so that
//! guarantees survive composition:
//!
//! | Constant | Meaning |
//! |----------|---------|
//! | [`SKIPPABLE`](Awaitable::SKIPPABLE) | `await_early_cancel` always returns true |
//! | [`ABORTABLE`](Awaitable::ABORTABLE) | `await_cancel` always returns true |
//! | [`CANCEL_IS_CLEAN`](Awaitable::CANCEL_IS_CLEAN) | `await_must_resume` always returns false |

pub mod immediate;
pub mod sanitizer;
pub mod suspend;

pub use immediate::{fail, ready, Fail, Ready};
pub use sanitizer::Sanitized;
pub use suspend::{
    suspend_forever, suspend_until, yield_now, SuspendForever, SuspendUntil, YieldNow,
};

use crate::error::Result;
use crate::runtime::executor::Executor;
use crate::runtime::frame::Handle;

/// An object participating in the suspend/resume protocol.
///
/// # Call order
///
/// A driver calls, in order:
///
/// 1. optionally `await_set_executor`;
/// 2. optionally `await_early_cancel` (if true, nothing else is called);
/// 3. `await_ready`; if true, skip to step 6;
/// 4. `await_suspend` exactly once;
/// 5. optionally `await_cancel` (if true, nothing else is called);
/// 6. after the parent handle was resumed (or `await_ready` was true), and
///    only if a cancel is outstanding, `await_must_resume`; then
///    `await_resume` unless `await_must_resume` returned false.
///
/// `await_resume` is called at most once.
pub trait Awaitable {
    /// The value produced on success.
    type Output;

    /// What `await_suspend` returns; see [`SuspendResult`].
    type Suspend: SuspendResult;

    /// `await_early_cancel` always succeeds.
    const SKIPPABLE: bool = false;
    /// `await_cancel` always completes synchronously.
    const ABORTABLE: bool = false;
    /// `await_must_resume` always returns false.
    const CANCEL_IS_CLEAN: bool = false;

    /// Returns true if the result is available without suspending.
    fn await_ready(&self) -> bool;

    /// Starts the operation. `parent` must be resumed exactly once when the
    /// operation completes, unless a later `await_cancel` returns true.
    fn await_suspend(&mut self, parent: Handle) -> Self::Suspend;

    /// Produces the result.
    fn await_resume(&mut self) -> Result<Self::Output>;

    /// Cancels before `await_suspend`. Returning true consumes the cancel;
    /// the awaitable is then never suspended or resumed.
    fn await_early_cancel(&mut self) -> bool {
        Self::SKIPPABLE
    }

    /// Cancels after `await_suspend`. Returning true means the operation was
    /// cancelled synchronously and `parent` will not be resumed. Returning
    /// false means `parent` will be resumed later, after which
    /// `await_must_resume` decides whether a result must be harvested.
    fn await_cancel(&mut self, parent: Handle) -> bool {
        let _ = parent;
        Self::ABORTABLE
    }

    /// After a cancel that did not complete synchronously: must
    /// `await_resume` still be called?
    fn await_must_resume(&self) -> bool {
        !Self::CANCEL_IS_CLEAN
    }

    /// Binds the awaitable to the executor it will run on.
    fn await_set_executor(&mut self, executor: &Executor) {
        let _ = executor;
    }
}

/// Values `await_suspend` may return.
///
/// The sanitizer converts them to a handle:
///
/// | Return | Meaning |
/// |--------|---------|
/// | `()` | stay suspended |
/// | `true` | stay suspended |
/// | `false` | resume the parent immediately |
/// | a [`Handle`] | resume that handle (the parent's own handle resumes the parent immediately; the no-op handle stays suspended) |
/// | `Err(e)` | the operation failed with `e` |
pub trait SuspendResult {
    /// Normalizes to the handle to resume next, given the parent handle.
    fn into_handle(self, parent: &Handle) -> Result<Handle>;
}

impl SuspendResult for () {
    fn into_handle(self, _parent: &Handle) -> Result<Handle> {
        Ok(Handle::noop())
    }
}

impl SuspendResult for bool {
    fn into_handle(self, parent: &Handle) -> Result<Handle> {
        Ok(if self { Handle::noop() } else { parent.clone() })
    }
}

impl SuspendResult for Handle {
    fn into_handle(self, _parent: &Handle) -> Result<Handle> {
        Ok(self)
    }
}

impl<T: SuspendResult> SuspendResult for Result<T> {
    fn into_handle(self, parent: &Handle) -> Result<Handle> {
        self?.into_handle(parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::runtime::frame::ProxyFrame;

    #[test]
    fn suspend_results_normalize() {
        let frame = ProxyFrame::new(|| {});
        let parent = Handle::new(&frame);

        assert!(().into_handle(&parent).unwrap().is_noop());
        assert!(true.into_handle(&parent).unwrap().is_noop());
        assert!(false.into_handle(&parent).unwrap().ptr_eq(&parent));
        assert!(parent.clone().into_handle(&parent).unwrap().ptr_eq(&parent));

        let ok: Result<bool> = Ok(false);
        assert!(ok.into_handle(&parent).unwrap().ptr_eq(&parent));
        let err: Result<()> = Err(Error::user("refused"));
        assert_eq!(err.into_handle(&parent).unwrap_err().message(), Some("refused"));
    }
}
