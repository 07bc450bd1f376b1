//! The sanitizing adapter every awaitable is driven through.
//!
//! [`Sanitized`] normalizes `await_suspend` to a [`Handle`] and, in debug
//! builds, tracks the protocol phase of the wrapped awaitable. Out-of-order
//! calls are reported at error level and panic. Dropping an awaitable that
//! is still suspended is reported unless its executor abandoned it.
//!
//! The static capability constants are cross-checked against runtime
//! answers. A disagreement (for example a `SKIPPABLE` awaitable whose early
//! cancel returns false) asserts in debug builds; in release builds the
//! runtime answer wins, so the cancel degrades to the pending path.

use crate::awaiter::{Awaitable, SuspendResult};
use crate::error::Result;
use crate::runtime::executor::Executor;
use crate::runtime::frame::Handle;

#[cfg(debug_assertions)]
use crate::runtime::executor::AbandonToken;
#[cfg(debug_assertions)]
use crate::tracing_compat::error;

/// An awaitable with normalized suspend and protocol checks.
pub struct Sanitized<A: Awaitable> {
    inner: A,
    #[cfg(debug_assertions)]
    checker: Checker,
}

impl<A: Awaitable> Sanitized<A> {
    /// Wraps an awaitable.
    #[must_use]
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            #[cfg(debug_assertions)]
            checker: Checker::new(std::any::type_name::<A>()),
        }
    }

    /// Borrows the wrapped awaitable.
    #[must_use]
    pub fn get_ref(&self) -> &A {
        &self.inner
    }

    /// Binds the awaitable to an executor.
    pub fn set_executor(&mut self, executor: &Executor) {
        #[cfg(debug_assertions)]
        self.checker.bind(executor.abandon_token());
        self.inner.await_set_executor(executor);
    }

    /// Cancels before suspension.
    pub fn early_cancel(&mut self) -> bool {
        #[cfg(debug_assertions)]
        self.checker.early_cancel();
        let cancelled = self.inner.await_early_cancel();
        debug_assert!(
            cancelled || !A::SKIPPABLE,
            "skippable awaitable {} refused an early cancel",
            std::any::type_name::<A>()
        );
        #[cfg(debug_assertions)]
        if cancelled {
            self.checker.finish();
        }
        cancelled
    }

    /// Queries readiness.
    #[must_use]
    pub fn ready(&self) -> bool {
        #[cfg(debug_assertions)]
        self.checker.ready_query();
        let ready = self.inner.await_ready();
        #[cfg(debug_assertions)]
        if ready {
            self.checker.mark_ready();
        }
        ready
    }

    /// Suspends. Returns the handle to resume next: `parent` itself to
    /// resume immediately, the no-op handle to stay suspended, or another
    /// frame to transfer to.
    pub fn suspend(&mut self, parent: Handle) -> Result<Handle> {
        #[cfg(debug_assertions)]
        self.checker.suspend();
        let next = self.inner.await_suspend(parent.clone()).into_handle(&parent);
        #[cfg(debug_assertions)]
        if next.is_err() {
            self.checker.finish();
        }
        next
    }

    /// Cancels after suspension.
    pub fn cancel(&mut self, parent: Handle) -> bool {
        #[cfg(debug_assertions)]
        self.checker.cancel();
        let cancelled = self.inner.await_cancel(parent);
        debug_assert!(
            cancelled || !A::ABORTABLE,
            "abortable awaitable {} refused a cancel",
            std::any::type_name::<A>()
        );
        #[cfg(debug_assertions)]
        if cancelled {
            self.checker.finish();
        }
        cancelled
    }

    /// After an unfinished cancel: must the result still be harvested?
    #[must_use]
    pub fn must_resume(&self) -> bool {
        #[cfg(debug_assertions)]
        self.checker.must_resume_query();
        let must = self.inner.await_must_resume();
        debug_assert!(
            !must || !A::CANCEL_IS_CLEAN,
            "clean-cancel awaitable {} demanded a resume",
            std::any::type_name::<A>()
        );
        #[cfg(debug_assertions)]
        if !must {
            self.checker.finish();
        }
        must
    }

    /// Produces the result.
    pub fn resume(&mut self) -> Result<A::Output> {
        #[cfg(debug_assertions)]
        self.checker.resume();
        self.inner.await_resume()
    }

    /// Suppresses the drop-time check, for awaitables whose executor went
    /// away with work pending.
    pub fn abandon(&mut self) {
        #[cfg(debug_assertions)]
        self.checker.abandoned.set(true);
    }
}

impl<A: Awaitable> Awaitable for Sanitized<A> {
    type Output = A::Output;
    type Suspend = Result<Handle>;

    const SKIPPABLE: bool = A::SKIPPABLE;
    const ABORTABLE: bool = A::ABORTABLE;
    const CANCEL_IS_CLEAN: bool = A::CANCEL_IS_CLEAN;

    fn await_ready(&self) -> bool {
        self.ready()
    }

    fn await_suspend(&mut self, parent: Handle) -> Result<Handle> {
        self.suspend(parent)
    }

    fn await_resume(&mut self) -> Result<A::Output> {
        self.resume()
    }

    fn await_early_cancel(&mut self) -> bool {
        self.early_cancel()
    }

    fn await_cancel(&mut self, parent: Handle) -> bool {
        self.cancel(parent)
    }

    fn await_must_resume(&self) -> bool {
        self.must_resume()
    }

    fn await_set_executor(&mut self, executor: &Executor) {
        self.set_executor(executor);
    }
}

impl<A: Awaitable> std::fmt::Debug for Sanitized<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Sanitized");
        s.field("awaitable", &std::any::type_name::<A>());
        #[cfg(debug_assertions)]
        s.field("phase", &self.checker.phase.get());
        s.finish()
    }
}

#[cfg(debug_assertions)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Not suspended yet.
    Initial,
    /// `await_suspend` returned; the parent may or may not have been resumed.
    Suspended,
    /// `await_cancel` returned false.
    Cancelling,
    /// Resumed, cancelled cleanly, or failed in `await_suspend`.
    Done,
}

#[cfg(debug_assertions)]
struct Checker {
    name: &'static str,
    phase: std::cell::Cell<Phase>,
    ready_seen: std::cell::Cell<bool>,
    cancel_pending: std::cell::Cell<bool>,
    abandoned: std::cell::Cell<bool>,
    token: Option<AbandonToken>,
}

#[cfg(debug_assertions)]
impl Checker {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            phase: std::cell::Cell::new(Phase::Initial),
            ready_seen: std::cell::Cell::new(false),
            cancel_pending: std::cell::Cell::new(false),
            abandoned: std::cell::Cell::new(false),
            token: None,
        }
    }

    #[track_caller]
    fn violation(&self, op: &str) -> ! {
        let phase = self.phase.get();
        error!(awaitable = self.name, op, ?phase, "awaiter protocol violation");
        panic!(
            "awaiter protocol violation: {op} in phase {phase:?} on {}",
            self.name
        );
    }

    fn bind(&mut self, token: AbandonToken) {
        if matches!(self.phase.get(), Phase::Suspended | Phase::Cancelling) {
            self.violation("await_set_executor");
        }
        self.token = Some(token);
    }

    fn ready_query(&self) {
        if self.phase.get() != Phase::Initial {
            self.violation("await_ready");
        }
    }

    fn mark_ready(&self) {
        self.ready_seen.set(true);
    }

    fn early_cancel(&self) {
        if self.phase.get() != Phase::Initial || self.cancel_pending.get() {
            self.violation("await_early_cancel");
        }
        self.cancel_pending.set(true);
    }

    fn suspend(&self) {
        if self.phase.get() != Phase::Initial {
            self.violation("await_suspend");
        }
        self.phase.set(Phase::Suspended);
    }

    fn cancel(&self) {
        if self.phase.get() != Phase::Suspended {
            self.violation("await_cancel");
        }
        self.phase.set(Phase::Cancelling);
    }

    fn must_resume_query(&self) {
        let ok = match self.phase.get() {
            Phase::Initial => self.ready_seen.get(),
            Phase::Suspended | Phase::Cancelling => true,
            Phase::Done => false,
        };
        if !ok {
            self.violation("await_must_resume");
        }
    }

    fn resume(&self) {
        let ok = match self.phase.get() {
            Phase::Initial => self.ready_seen.get(),
            Phase::Suspended | Phase::Cancelling => true,
            Phase::Done => false,
        };
        if !ok {
            self.violation("await_resume");
        }
        self.phase.set(Phase::Done);
    }

    fn finish(&self) {
        self.phase.set(Phase::Done);
    }

    fn is_abandoned(&self) -> bool {
        self.abandoned.get() || self.token.as_ref().is_some_and(AbandonToken::is_abandoned)
    }
}

#[cfg(debug_assertions)]
impl Drop for Checker {
    fn drop(&mut self) {
        let phase = self.phase.get();
        if matches!(phase, Phase::Suspended | Phase::Cancelling) && !self.is_abandoned() {
            error!(
                awaitable = self.name,
                ?phase,
                "awaitable destroyed while suspended"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::runtime::frame::ProxyFrame;

    /// Scripted awaitable used to exercise the normalization paths.
    struct Scripted {
        ready: bool,
        suspend_immediately: bool,
        fail_suspend: bool,
        cancel_ok: bool,
        must_resume: bool,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                ready: false,
                suspend_immediately: false,
                fail_suspend: false,
                cancel_ok: false,
                must_resume: true,
            }
        }
    }

    impl Awaitable for Scripted {
        type Output = u32;
        type Suspend = Result<bool>;

        fn await_ready(&self) -> bool {
            self.ready
        }

        fn await_suspend(&mut self, _parent: Handle) -> Result<bool> {
            if self.fail_suspend {
                return Err(Error::user("suspend failed"));
            }
            Ok(!self.suspend_immediately)
        }

        fn await_resume(&mut self) -> Result<u32> {
            Ok(42)
        }

        fn await_cancel(&mut self, _parent: Handle) -> bool {
            self.cancel_ok
        }

        fn await_must_resume(&self) -> bool {
            self.must_resume
        }
    }

    fn parent() -> (std::rc::Rc<ProxyFrame>, Handle) {
        let frame = ProxyFrame::new(|| {});
        let handle = Handle::new(&frame);
        (frame, handle)
    }

    #[test]
    fn defaults_for_missing_hooks() {
        struct Minimal;
        impl Awaitable for Minimal {
            type Output = ();
            type Suspend = ();
            fn await_ready(&self) -> bool {
                false
            }
            fn await_suspend(&mut self, _parent: Handle) {}
            fn await_resume(&mut self) -> Result<()> {
                Ok(())
            }
        }

        let (_frame, h) = parent();
        let mut a = Sanitized::new(Minimal);
        assert!(!a.early_cancel());
        assert!(!a.ready());
        assert!(a.suspend(h.clone()).unwrap().is_noop());
        assert!(!a.cancel(h));
        assert!(a.must_resume());
        a.resume().unwrap();
    }

    #[test]
    fn ready_path_resumes_without_suspend() {
        let mut a = Sanitized::new(Scripted {
            ready: true,
            ..Scripted::new()
        });
        assert!(a.ready());
        assert_eq!(a.resume().unwrap(), 42);
    }

    #[test]
    fn immediate_resume_returns_parent() {
        let (_frame, h) = parent();
        let mut a = Sanitized::new(Scripted {
            suspend_immediately: true,
            ..Scripted::new()
        });
        let next = a.suspend(h.clone()).unwrap();
        assert!(next.ptr_eq(&h));
        assert_eq!(a.resume().unwrap(), 42);
    }

    #[test]
    fn suspend_error_finishes_the_protocol() {
        let (_frame, h) = parent();
        let mut a = Sanitized::new(Scripted {
            fail_suspend: true,
            ..Scripted::new()
        });
        let err = a.suspend(h).unwrap_err();
        assert_eq!(err.message(), Some("suspend failed"));
    }

    #[test]
    fn unfinished_cancel_then_clean_drop() {
        let (_frame, h) = parent();
        let mut a = Sanitized::new(Scripted {
            must_resume: false,
            ..Scripted::new()
        });
        assert!(a.suspend(h.clone()).unwrap().is_noop());
        assert!(!a.cancel(h));
        assert!(!a.must_resume());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "awaiter protocol violation")]
    fn double_suspend_is_a_violation() {
        let (_frame, h) = parent();
        let mut a = Sanitized::new(Scripted::new());
        let _ = a.suspend(h.clone());
        let _ = a.suspend(h);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "awaiter protocol violation")]
    fn double_resume_is_a_violation() {
        let mut a = Sanitized::new(Scripted {
            ready: true,
            ..Scripted::new()
        });
        assert!(a.ready());
        let _ = a.resume();
        let _ = a.resume();
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "awaiter protocol violation")]
    fn resume_without_ready_or_suspend_is_a_violation() {
        let mut a = Sanitized::new(Scripted::new());
        let _ = a.resume();
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "refused an early cancel")]
    fn skippable_mismatch_asserts() {
        struct Liar;
        impl Awaitable for Liar {
            type Output = ();
            type Suspend = ();
            const SKIPPABLE: bool = true;
            fn await_ready(&self) -> bool {
                false
            }
            fn await_suspend(&mut self, _parent: Handle) {}
            fn await_resume(&mut self) -> Result<()> {
                Ok(())
            }
            fn await_early_cancel(&mut self) -> bool {
                false
            }
        }
        let mut a = Sanitized::new(Liar);
        let _ = a.early_cancel();
    }

    #[test]
    fn abandoned_drop_is_silent() {
        let (_frame, h) = parent();
        let ex = Executor::new();
        let mut a = Sanitized::new(Scripted::new());
        a.set_executor(&ex);
        let _ = a.suspend(h);
        ex.abandon_all();
        drop(a);
    }
}
