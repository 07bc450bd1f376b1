//! Deadlines by composition.
//!
//! A [`Timeout`] is `any_of(work, sleep_for(duration))`: whichever finishes
//! first cancels the other. The sleep winning maps to
//! [`ErrorKind::DeadlineExceeded`](crate::error::ErrorKind::DeadlineExceeded).
//!
//! If `work` refuses to be cancelled, the timeout waits for it; a value it
//! produces after the deadline is still returned.

use std::rc::Rc;
use std::time::Duration;

use crate::awaiter::Awaitable;
use crate::combinator::{any_of, AnyOf, MuxChild, MuxHelper};
use crate::error::{Error, Result};
use crate::runtime::executor::Executor;
use crate::runtime::frame::{FrameState, Handle};
use crate::time::sleep::{sleep_for, Sleep};

/// Races an awaitable against a sleep.
#[derive(Debug)]
pub struct Timeout<A: Awaitable + 'static> {
    inner: AnyOf<(Rc<MuxHelper<A>>, Rc<MuxHelper<Sleep>>)>,
}

/// Fails with `DeadlineExceeded` unless `work` completes within `duration`
/// of executor time.
pub fn timeout<A: Awaitable + 'static>(duration: Duration, work: A) -> Timeout<A> {
    Timeout {
        inner: any_of((work, sleep_for(duration))),
    }
}

impl<A: Awaitable + 'static> Timeout<A> {
    fn work_state(&self) -> FrameState {
        self.inner.mux().set().0.state()
    }
}

impl<A: Awaitable + 'static> Awaitable for Timeout<A> {
    type Output = A::Output;
    type Suspend = bool;

    const SKIPPABLE: bool = A::SKIPPABLE;
    const ABORTABLE: bool = A::ABORTABLE;

    fn await_ready(&self) -> bool {
        self.inner.await_ready()
    }

    fn await_suspend(&mut self, parent: Handle) -> bool {
        self.inner.await_suspend(parent)
    }

    fn await_early_cancel(&mut self) -> bool {
        self.inner.await_early_cancel()
    }

    fn await_cancel(&mut self, parent: Handle) -> bool {
        self.inner.await_cancel(parent)
    }

    fn await_must_resume(&self) -> bool {
        matches!(
            self.work_state(),
            FrameState::Succeeded | FrameState::Failed
        )
    }

    fn await_set_executor(&mut self, executor: &Executor) {
        self.inner.await_set_executor(executor);
    }

    fn await_resume(&mut self) -> Result<A::Output> {
        match self.inner.await_resume()? {
            (Some(value), _) => Ok(value),
            (None, Some(())) => Err(Error::deadline_exceeded()),
            (None, None) => Err(Error::cancelled()),
        }
    }
}
