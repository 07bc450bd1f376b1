//! Tasks: user coroutines as awaitables.
//!
//! A [`Task`] wraps an `async` body taking a [`Cx`]. It is an ordinary
//! [`Awaitable`], so tasks compose under every combinator and are the unit
//! the runtime runs at the root.
//!
//! The body is polled on the executor's thread whenever its frame is
//! resumed: by the awaitable it waits on, by the executor, or by a foreign
//! `Waker`. A resume that arrives while the body is being polled is latched
//! and turns into one more poll.
//!
//! # Cancellation
//!
//! - Before it starts, a task is skippable: the body is dropped unpolled.
//! - While it waits on an awaitable, the cancel is forwarded to it. If that
//!   completes synchronously the body is dropped and the cancel is
//!   synchronous too; otherwise the task ends once the awaitable settles.
//! - While it waits on a foreign future, the body is dropped at once.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use crate::awaiter::Awaitable;
use crate::cx::cx::{Cx, TaskCore};
use crate::error::{Error, Result};
use crate::runtime::executor::Executor;
use crate::runtime::frame::{Frame, FrameKind, FrameState, Handle};
use crate::tracing_compat::{debug, trace};
use crate::types::TaskId;

type Body<T> = Pin<Box<dyn Future<Output = Result<T>>>>;

/// Waker for tasks polled before they were bound to an executor.
struct NoopWaker;

impl Wake for NoopWaker {
    fn wake(self: Arc<Self>) {}
}

struct TaskFrame<T> {
    core: Rc<TaskCore>,
    state: Cell<FrameState>,
    body: RefCell<Option<Body<T>>>,
    result: RefCell<Option<Result<T>>>,
    parent: RefCell<Handle>,
    busy: Cell<bool>,
    repoll: Cell<bool>,
    waker: RefCell<Option<Waker>>,
}

impl<T> TaskFrame<T> {
    fn set_state(&self, next: FrameState) {
        debug_assert!(
            self.state.get().can_transition_to(next),
            "task left terminal state {} for {next}",
            self.state.get()
        );
        self.state.set(next);
    }

    fn drop_body(&self) {
        let body = self.body.borrow_mut().take();
        drop(body);
    }

    fn drive(&self) {
        if self.busy.get() {
            self.repoll.set(true);
            return;
        }
        if self.state.get().is_terminal() {
            trace!(task = ?self.core.id(), "resume of a finished task ignored");
            return;
        }
        self.busy.set(true);
        let waker = self
            .waker
            .borrow()
            .clone()
            .unwrap_or_else(|| Waker::from(Arc::new(NoopWaker)));
        loop {
            self.repoll.set(false);
            let mut cx = Context::from_waker(&waker);
            let poll = {
                let mut body = self.body.borrow_mut();
                match body.as_mut() {
                    Some(fut) => fut.as_mut().poll(&mut cx),
                    None => break,
                }
            };
            match poll {
                Poll::Ready(result) => {
                    self.drop_body();
                    self.finish_with(result);
                    break;
                }
                Poll::Pending if self.core.is_unwinding() => {
                    self.drop_body();
                    self.set_state(FrameState::Cancelled);
                    break;
                }
                Poll::Pending if self.repoll.get() => {}
                Poll::Pending => break,
            }
        }
        self.busy.set(false);
        if self.state.get().is_terminal() {
            self.complete();
        }
    }

    fn finish_with(&self, result: Result<T>) {
        let result = match (result, self.core.id()) {
            (Err(err), Some(id)) => Err(err.in_task(id)),
            (result, _) => result,
        };
        let state = if result.is_ok() {
            FrameState::Succeeded
        } else {
            FrameState::Failed
        };
        *self.result.borrow_mut() = Some(result);
        self.set_state(state);
    }

    /// Unregisters the task and resumes its parent.
    fn complete(&self) {
        if let Some((executor, id)) = self.core.unbind() {
            executor.unregister_task(id);
        }
        debug!(task = ?self.core.id(), state = %self.state.get(), "task finished");
        let parent = self.parent.replace(Handle::noop());
        parent.resume();
    }

    fn cancel(&self) -> bool {
        self.core.request_cancel();
        if self.busy.get() {
            return false;
        }
        if self.state.get() != FrameState::Running {
            return self.state.get() == FrameState::Cancelled;
        }
        trace!(task = ?self.core.id(), "task cancel requested");
        let Some(parked) = self.core.parked() else {
            self.drop_body();
            self.set_state(FrameState::Cancelled);
            self.complete_silently();
            return true;
        };
        self.busy.set(true);
        let cancelled = parked.cancel();
        self.busy.set(false);
        if cancelled {
            self.core.unpark();
            self.drop_body();
            self.set_state(FrameState::Cancelled);
            self.complete_silently();
            return true;
        }
        if self.repoll.get() {
            self.drive();
        }
        false
    }

    /// Unregisters a task cancelled synchronously; its parent is not resumed.
    fn complete_silently(&self) {
        *self.parent.borrow_mut() = Handle::noop();
        self.complete();
    }
}

impl<T> Frame for TaskFrame<T> {
    fn resume(&self) {
        self.drive();
    }

    fn kind(&self) -> FrameKind {
        FrameKind::Coroutine
    }

    fn parent(&self) -> Option<Handle> {
        Some(self.parent.borrow().clone())
    }
}

/// A task: an `async` body driven as an awaitable.
#[must_use = "tasks do nothing unless awaited or run"]
pub struct Task<T> {
    frame: Rc<TaskFrame<T>>,
}

/// Creates a task from an `async` body.
///
/// ```
/// use oxco::{run, task};
///
/// let v = run(|cx| async move {
///     let child = task(|cx| async move {
///         cx.yield_now().await?;
///         Ok(20)
///     });
///     Ok(cx.wait(child).await? + 1)
/// });
/// assert_eq!(v.unwrap(), 21);
/// ```
pub fn task<T, F, Fut>(f: F) -> Task<T>
where
    T: 'static,
    F: FnOnce(Cx) -> Fut,
    Fut: Future<Output = Result<T>> + 'static,
{
    let core = TaskCore::new();
    let body: Body<T> = Box::pin(f(Cx::new(Rc::clone(&core))));
    let frame = Rc::new(TaskFrame {
        core,
        state: Cell::new(FrameState::NotStarted),
        body: RefCell::new(Some(body)),
        result: RefCell::new(None),
        parent: RefCell::new(Handle::noop()),
        busy: Cell::new(false),
        repoll: Cell::new(false),
        waker: RefCell::new(None),
    });
    frame.core.set_frame(Handle::new(&frame));
    Task { frame }
}

impl<T> Task<T> {
    /// The task's id, once bound to an executor.
    #[must_use]
    pub fn id(&self) -> Option<TaskId> {
        self.frame.core.id()
    }

    /// The task's lifecycle state.
    #[must_use]
    pub fn state(&self) -> FrameState {
        self.frame.state.get()
    }

    /// A handle to the task's frame.
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.frame.core.frame()
    }
}

impl<T: 'static> Awaitable for Task<T> {
    type Output = T;
    type Suspend = bool;

    const SKIPPABLE: bool = true;

    fn await_ready(&self) -> bool {
        false
    }

    fn await_set_executor(&mut self, executor: &Executor) {
        let id = executor.register_task(self.frame.core.frame());
        self.frame.core.bind(executor, id);
        *self.frame.waker.borrow_mut() = Some(executor.waker_for(id));
    }

    fn await_early_cancel(&mut self) -> bool {
        self.frame.core.request_cancel();
        self.frame.drop_body();
        self.frame.set_state(FrameState::Cancelled);
        self.frame.complete_silently();
        true
    }

    fn await_suspend(&mut self, parent: Handle) -> bool {
        debug!(task = ?self.id(), "task started");
        *self.frame.parent.borrow_mut() = Handle::noop();
        self.frame.set_state(FrameState::Running);
        self.frame.drive();
        if self.frame.state.get().is_terminal() {
            return false;
        }
        *self.frame.parent.borrow_mut() = parent;
        true
    }

    fn await_cancel(&mut self, _parent: Handle) -> bool {
        self.frame.cancel()
    }

    fn await_must_resume(&self) -> bool {
        matches!(
            self.frame.state.get(),
            FrameState::Succeeded | FrameState::Failed
        )
    }

    fn await_resume(&mut self) -> Result<T> {
        self.frame
            .result
            .borrow_mut()
            .take()
            .unwrap_or_else(|| Err(Error::cancelled()))
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::awaiter::suspend_forever;
    use crate::test_utils::{init_test_logging, scripted, Driver};

    #[test]
    fn body_without_waits_completes_during_suspend() {
        let mut d = Driver::new(task(|_cx| async { Ok(5) }));
        d.start().unwrap();
        assert_eq!(d.resumes(), 1);
        assert_eq!(d.get_ref().state(), FrameState::Succeeded);
        assert_eq!(d.finish().unwrap(), 5);
    }

    #[test]
    fn body_resumes_after_wait() {
        init_test_logging();
        let (p, h) = scripted::<u32>();
        let mut d = Driver::new(task(move |cx| async move {
            let v = cx.wait(p).await?;
            Ok(v * 2)
        }));
        d.start().unwrap();
        assert_eq!(d.resumes(), 0);
        assert_eq!(d.get_ref().state(), FrameState::Running);
        h.complete(21);
        assert_eq!(d.resumes(), 1);
        assert_eq!(d.finish().unwrap(), 42);
    }

    #[test]
    fn errors_are_tagged_with_task_id() {
        let mut d = Driver::new(task(|_cx| async { Err::<(), _>(Error::user("bad")) }));
        d.start().unwrap();
        let id = d.get_ref().id();
        let err = d.finish().unwrap_err();
        assert_eq!(err.task(), id);
        assert_eq!(err.message(), Some("bad"));
    }

    #[test]
    fn early_cancel_drops_unstarted_body() {
        let dropped = Rc::new(Cell::new(false));
        let flag = Rc::clone(&dropped);
        struct OnDrop(Rc<Cell<bool>>);
        impl Drop for OnDrop {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }
        let guard = OnDrop(flag);
        let mut d = Driver::new(task(move |_cx| async move {
            let _guard = guard;
            Ok(())
        }));
        assert!(d.early_cancel());
        assert!(dropped.get());
        assert_eq!(d.get_ref().state(), FrameState::Cancelled);
    }

    #[test]
    fn abortable_wait_makes_cancel_synchronous() {
        init_test_logging();
        let mut d = Driver::new(task(|cx| async move {
            cx.wait(suspend_forever()).await?;
            Ok(())
        }));
        d.start().unwrap();
        assert!(d.cancel());
        assert_eq!(d.get_ref().state(), FrameState::Cancelled);
        assert_eq!(d.resumes(), 0);
    }

    #[test]
    fn stubborn_wait_defers_cancel() {
        init_test_logging();
        let (p, h) = scripted::<u32>();
        let mut d = Driver::new(task(move |cx| async move {
            let v = cx.wait(p).await?;
            Ok(v + 1)
        }));
        d.start().unwrap();
        assert!(!d.cancel());
        assert_eq!(h.cancels(), 1);
        h.complete(1);
        assert_eq!(d.resumes(), 1);
        assert!(d.must_resume());
        assert_eq!(d.finish().unwrap(), 2);
    }

    #[test]
    fn stubborn_wait_without_value_unwinds() {
        init_test_logging();
        let (p, h) = scripted::<u32>();
        let reached = Rc::new(Cell::new(false));
        let flag = Rc::clone(&reached);
        let mut d = Driver::new(task(move |cx| async move {
            cx.wait(p).await?;
            flag.set(true);
            Ok(())
        }));
        d.start().unwrap();
        assert!(!d.cancel());
        h.wake();
        assert_eq!(d.resumes(), 1);
        assert!(!reached.get());
        assert_eq!(d.get_ref().state(), FrameState::Cancelled);
        assert!(!d.must_resume());
    }

    #[test]
    fn foreign_future_is_dropped_on_cancel() {
        let mut d = Driver::new(task(|_cx| async {
            std::future::pending::<()>().await;
            Ok(())
        }));
        d.start().unwrap();
        assert_eq!(d.get_ref().state(), FrameState::Running);
        assert!(d.cancel());
        assert_eq!(d.get_ref().state(), FrameState::Cancelled);
    }
}
