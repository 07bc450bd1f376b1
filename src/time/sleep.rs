//! Sleep awaitable for delaying execution.
//!
//! A [`Sleep`] completes once the executor clock reaches its deadline. Under
//! the virtual clock an otherwise idle executor jumps straight to the
//! deadline, so sleeps cost no wall time in tests.
//!
//! # Cancel Safety
//!
//! `Sleep` is skippable and abortable: cancelling it removes the timer (or
//! the already-posted wake-up) and completes synchronously.

use std::time::Duration;

use crate::awaiter::Awaitable;
use crate::error::{Error, Result};
use crate::runtime::executor::Executor;
use crate::runtime::frame::Handle;
use crate::tracing_compat::trace;
use crate::types::{Time, TimerId};

#[derive(Debug, Clone, Copy)]
enum Deadline {
    After(Duration),
    At(Time),
}

/// Completes when the executor clock reaches a deadline.
#[derive(Debug)]
pub struct Sleep {
    deadline: Deadline,
    executor: Option<Executor>,
    timer: Option<(TimerId, Handle)>,
}

impl Sleep {
    /// Creates a sleep that completes at `deadline`.
    #[must_use]
    pub const fn until(deadline: Time) -> Self {
        Self {
            deadline: Deadline::At(deadline),
            executor: None,
            timer: None,
        }
    }

    /// Creates a sleep that completes `duration` after it is bound to an
    /// executor.
    #[must_use]
    pub const fn after(duration: Duration) -> Self {
        Self {
            deadline: Deadline::After(duration),
            executor: None,
            timer: None,
        }
    }

    /// The absolute deadline, once known.
    #[must_use]
    pub fn deadline(&self) -> Option<Time> {
        match self.deadline {
            Deadline::At(t) => Some(t),
            Deadline::After(_) => None,
        }
    }
}

/// Sleeps for `duration` of executor time.
#[must_use]
pub const fn sleep_for(duration: Duration) -> Sleep {
    Sleep::after(duration)
}

/// Sleeps until the executor clock reaches `deadline`.
#[must_use]
pub const fn sleep_until(deadline: Time) -> Sleep {
    Sleep::until(deadline)
}

impl Awaitable for Sleep {
    type Output = ();
    type Suspend = Result<()>;

    const SKIPPABLE: bool = true;
    const ABORTABLE: bool = true;
    const CANCEL_IS_CLEAN: bool = true;

    fn await_ready(&self) -> bool {
        match self.deadline {
            Deadline::After(d) => d.is_zero(),
            Deadline::At(t) => self.executor.as_ref().is_some_and(|ex| ex.now() >= t),
        }
    }

    fn await_suspend(&mut self, parent: Handle) -> Result<()> {
        let executor = self
            .executor
            .as_ref()
            .ok_or_else(|| Error::internal("sleep awaited without an executor"))?;
        let deadline = match self.deadline {
            Deadline::At(t) => t,
            Deadline::After(d) => executor.now() + d,
        };
        trace!(deadline = %deadline, "sleep armed");
        let id = executor.schedule_at(deadline, parent.clone());
        self.timer = Some((id, parent));
        Ok(())
    }

    fn await_resume(&mut self) -> Result<()> {
        self.timer = None;
        Ok(())
    }

    fn await_cancel(&mut self, _parent: Handle) -> bool {
        match (&self.executor, self.timer.take()) {
            (Some(executor), Some((id, posted))) => {
                executor.cancel_timer(id) || executor.unpost(&posted)
            }
            _ => true,
        }
    }

    fn await_set_executor(&mut self, executor: &Executor) {
        if let Deadline::After(d) = self.deadline {
            if !d.is_zero() {
                self.deadline = Deadline::At(executor.now() + d);
            }
        }
        self.executor = Some(executor.clone());
    }
}
