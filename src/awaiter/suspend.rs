//! Suspend primitives: yield, suspend forever, suspend until a condition.

use std::cell::Cell;
use std::convert::Infallible;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::awaiter::Awaitable;
use crate::error::{Error, Result};
use crate::runtime::executor::Executor;
use crate::runtime::frame::{Frame, Handle};

/// Reschedules the awaiting frame at the back of the executor queue.
#[derive(Debug, Default)]
pub struct YieldNow {
    executor: Option<Executor>,
    posted: Option<Handle>,
}

/// Yields to the scheduler: every handle posted so far runs before the caller
/// continues.
#[must_use]
pub fn yield_now() -> YieldNow {
    YieldNow::default()
}

impl Awaitable for YieldNow {
    type Output = ();
    type Suspend = bool;

    const SKIPPABLE: bool = true;
    const ABORTABLE: bool = true;
    const CANCEL_IS_CLEAN: bool = true;

    fn await_ready(&self) -> bool {
        false
    }

    fn await_suspend(&mut self, parent: Handle) -> bool {
        let Some(executor) = &self.executor else {
            return false;
        };
        executor.post(parent.clone());
        self.posted = Some(parent);
        true
    }

    fn await_resume(&mut self) -> Result<()> {
        Ok(())
    }

    fn await_cancel(&mut self, _parent: Handle) -> bool {
        match (&self.executor, self.posted.take()) {
            (Some(executor), Some(posted)) => executor.unpost(&posted),
            _ => true,
        }
    }

    fn await_set_executor(&mut self, executor: &Executor) {
        self.executor = Some(executor.clone());
    }
}

/// Never completes on its own; only cancellation ends it.
#[derive(Debug, Default)]
pub struct SuspendForever;

/// Suspends until cancelled.
#[must_use]
pub fn suspend_forever() -> SuspendForever {
    SuspendForever
}

impl Awaitable for SuspendForever {
    type Output = Infallible;
    type Suspend = ();

    const SKIPPABLE: bool = true;
    const ABORTABLE: bool = true;
    const CANCEL_IS_CLEAN: bool = true;

    fn await_ready(&self) -> bool {
        false
    }

    fn await_suspend(&mut self, _parent: Handle) {}

    fn await_resume(&mut self) -> Result<Infallible> {
        Err(Error::protocol("suspend_forever resumed"))
    }
}

/// Suspends until a predicate holds.
pub struct SuspendUntil {
    pred: Rc<dyn Fn() -> bool>,
    executor: Option<Executor>,
    watcher: Option<Rc<Watcher>>,
}

/// Suspends until `pred` returns true. The predicate is re-checked each time
/// the executor's ready queue drains.
pub fn suspend_until(pred: impl Fn() -> bool + 'static) -> SuspendUntil {
    SuspendUntil {
        pred: Rc::new(pred),
        executor: None,
        watcher: None,
    }
}

impl Awaitable for SuspendUntil {
    type Output = ();
    type Suspend = Result<()>;

    const SKIPPABLE: bool = true;
    const ABORTABLE: bool = true;
    const CANCEL_IS_CLEAN: bool = true;

    fn await_ready(&self) -> bool {
        (self.pred)()
    }

    fn await_suspend(&mut self, parent: Handle) -> Result<()> {
        let executor = self
            .executor
            .clone()
            .ok_or_else(|| Error::internal("suspend_until awaited without an executor"))?;
        let watcher = Rc::new_cyclic(|me: &Weak<Watcher>| Watcher {
            pred: Rc::clone(&self.pred),
            parent,
            executor: executor.clone(),
            done: Cell::new(false),
            me: Handle::from_weak(me),
        });
        executor.on_idle(watcher.me.clone());
        self.watcher = Some(watcher);
        Ok(())
    }

    fn await_resume(&mut self) -> Result<()> {
        Ok(())
    }

    fn await_cancel(&mut self, _parent: Handle) -> bool {
        if let Some(watcher) = self.watcher.take() {
            watcher.done.set(true);
        }
        true
    }

    fn await_set_executor(&mut self, executor: &Executor) {
        self.executor = Some(executor.clone());
    }
}

impl fmt::Debug for SuspendUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuspendUntil")
            .field("suspended", &self.watcher.is_some())
            .finish_non_exhaustive()
    }
}

struct Watcher {
    pred: Rc<dyn Fn() -> bool>,
    parent: Handle,
    executor: Executor,
    done: Cell<bool>,
    me: Handle,
}

impl Frame for Watcher {
    fn resume(&self) {
        if self.done.get() {
            return;
        }
        if (self.pred)() {
            self.done.set(true);
            self.parent.resume();
        } else {
            self.executor.on_idle(self.me.clone());
        }
    }

    fn parent(&self) -> Option<Handle> {
        Some(self.parent.clone())
    }
}
