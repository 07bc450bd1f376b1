//! The task context.
//!
//! `Cx` is the handle a task body receives. It is the only way for the body
//! to suspend on an awaitable ([`Cx::wait`]) and to query the task's
//! identity, clock and cancellation status.
//!
//! There is no ambient context: the parent chain lives in the frames, and
//! the executor is reached through the `Cx` explicitly.
//!
//! # Thread Safety
//!
//! `Cx` is neither `Send` nor `Sync`. A task and everything it waits on live
//! on the executor's thread.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::awaiter::{yield_now, Awaitable, YieldNow};
use crate::cx::wait::Wait;
use crate::runtime::executor::Executor;
use crate::runtime::frame::Handle;
use crate::time::{sleep_for, sleep_until, Sleep};
use crate::tracing_compat::trace;
use crate::types::{TaskId, Time};

/// Something a task is suspended on that can be asked to cancel.
pub(crate) trait Parked {
    /// Forwards a cancel to the awaitable. Returns true if it completed
    /// synchronously and the task will not be resumed.
    fn cancel(&self) -> bool;
}

/// State shared by a task frame, its `Cx` and its waits.
pub(crate) struct TaskCore {
    id: Cell<Option<TaskId>>,
    frame: RefCell<Handle>,
    executor: RefCell<Option<Executor>>,
    cancel_requested: Cell<bool>,
    unwinding: Cell<bool>,
    parked: RefCell<Option<Rc<dyn Parked>>>,
}

impl TaskCore {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            id: Cell::new(None),
            frame: RefCell::new(Handle::noop()),
            executor: RefCell::new(None),
            cancel_requested: Cell::new(false),
            unwinding: Cell::new(false),
            parked: RefCell::new(None),
        })
    }

    pub(crate) fn id(&self) -> Option<TaskId> {
        self.id.get()
    }

    pub(crate) fn frame(&self) -> Handle {
        self.frame.borrow().clone()
    }

    pub(crate) fn set_frame(&self, frame: Handle) {
        *self.frame.borrow_mut() = frame;
    }

    pub(crate) fn executor(&self) -> Option<Executor> {
        self.executor.borrow().clone()
    }

    pub(crate) fn bind(&self, executor: &Executor, id: TaskId) {
        self.id.set(Some(id));
        *self.executor.borrow_mut() = Some(executor.clone());
    }

    /// Forgets the executor binding, returning the id that was registered.
    pub(crate) fn unbind(&self) -> Option<(Executor, TaskId)> {
        let executor = self.executor.borrow_mut().take()?;
        let id = self.id.get()?;
        Some((executor, id))
    }

    pub(crate) fn request_cancel(&self) {
        self.cancel_requested.set(true);
    }

    pub(crate) fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.get()
    }

    pub(crate) fn begin_unwind(&self) {
        trace!(task = ?self.id(), "task unwinding after cancel");
        self.unwinding.set(true);
    }

    pub(crate) fn is_unwinding(&self) -> bool {
        self.unwinding.get()
    }

    pub(crate) fn park(&self, on: Rc<dyn Parked>) {
        *self.parked.borrow_mut() = Some(on);
    }

    pub(crate) fn unpark(&self) {
        self.parked.borrow_mut().take();
    }

    pub(crate) fn parked(&self) -> Option<Rc<dyn Parked>> {
        self.parked.borrow().clone()
    }
}

/// The context of a running task.
///
/// Cloning is cheap; clones refer to the same task. A task may have only one
/// [`Wait`] outstanding at a time, which is what `.await`ing each one in turn
/// gives you.
#[derive(Clone)]
pub struct Cx {
    core: Rc<TaskCore>,
}

impl Cx {
    pub(crate) fn new(core: Rc<TaskCore>) -> Self {
        Self { core }
    }

    /// Suspends the task on `awaitable` and yields its result.
    ///
    /// If the task is cancelled while suspended, the cancel is forwarded to
    /// the awaitable. When the awaitable settles without a value, the task
    /// body is dropped at this point and the task ends `Cancelled`.
    pub fn wait<A: Awaitable + 'static>(&self, awaitable: A) -> Wait<A> {
        Wait::new(Rc::clone(&self.core), awaitable)
    }

    /// Yields to the scheduler.
    pub fn yield_now(&self) -> Wait<YieldNow> {
        self.wait(yield_now())
    }

    /// Sleeps for `duration` of executor time.
    pub fn sleep(&self, duration: Duration) -> Wait<Sleep> {
        self.wait(sleep_for(duration))
    }

    /// Sleeps until the executor clock reaches `deadline`.
    pub fn sleep_until(&self, deadline: Time) -> Wait<Sleep> {
        self.wait(sleep_until(deadline))
    }

    /// The id assigned when the task was bound to an executor.
    #[must_use]
    pub fn task_id(&self) -> Option<TaskId> {
        self.core.id()
    }

    /// The executor the task runs on.
    #[must_use]
    pub fn executor(&self) -> Option<Executor> {
        self.core.executor()
    }

    /// Current executor time, or zero before the task is bound.
    #[must_use]
    pub fn now(&self) -> Time {
        self.core
            .executor
            .borrow()
            .as_ref()
            .map_or(Time::ZERO, Executor::now)
    }

    /// Returns true once the task has been asked to cancel.
    ///
    /// A body that never waits again can poll this to stop early.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.core.is_cancel_requested()
    }

    /// Emits a trace event tagged with the task id.
    #[cfg_attr(not(feature = "tracing-integration"), allow(unused_variables))]
    pub fn trace(&self, message: &str) {
        trace!(task = ?self.task_id(), "{message}");
    }
}

impl fmt::Debug for Cx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cx")
            .field("task", &self.task_id())
            .field("cancel_requested", &self.is_cancel_requested())
            .finish()
    }
}
