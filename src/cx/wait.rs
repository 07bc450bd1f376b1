//! The suspension point of a task: `cx.wait(awaitable).await`.
//!
//! A [`Wait`] is a `Future` that drives one awaitable through the protocol
//! on behalf of its task. The awaitable lives in a [`WaitSlot`], a small
//! proxy frame whose resume marks the slot and re-polls the task. While the
//! awaitable is suspended the slot is registered as the task's parked
//! awaitable, which is how a task cancel reaches it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use crate::awaiter::{Awaitable, Sanitized};
use crate::cx::cx::{Parked, TaskCore};
use crate::error::{Error, Result};
use crate::runtime::frame::{Frame, Handle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Idle,
    Suspended,
    Cancelling,
    Done,
}

struct WaitSlot<A: Awaitable> {
    awaitable: RefCell<Sanitized<A>>,
    state: Cell<SlotState>,
    resumed: Cell<bool>,
    task: Handle,
    me: Handle,
}

impl<A: Awaitable + 'static> WaitSlot<A> {
    fn new(awaitable: A, task: Handle) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Self>| Self {
            awaitable: RefCell::new(Sanitized::new(awaitable)),
            state: Cell::new(SlotState::Idle),
            resumed: Cell::new(false),
            task,
            me: Handle::from_weak(me),
        })
    }
}

impl<A: Awaitable> Frame for WaitSlot<A> {
    fn resume(&self) {
        self.resumed.set(true);
        self.task.resume();
    }

    fn parent(&self) -> Option<Handle> {
        Some(self.task.clone())
    }
}

impl<A: Awaitable> Parked for WaitSlot<A> {
    fn cancel(&self) -> bool {
        if self.state.get() != SlotState::Suspended || self.resumed.get() {
            return false;
        }
        self.state.set(SlotState::Cancelling);
        let cancelled = self.awaitable.borrow_mut().cancel(self.me.clone());
        if cancelled {
            self.state.set(SlotState::Done);
        }
        cancelled
    }
}

/// Future returned by [`Cx::wait`](crate::cx::Cx::wait).
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Wait<A: Awaitable> {
    core: Rc<TaskCore>,
    slot: Rc<WaitSlot<A>>,
    cancel_pending: bool,
}

impl<A: Awaitable + 'static> Wait<A> {
    pub(crate) fn new(core: Rc<TaskCore>, awaitable: A) -> Self {
        let slot = WaitSlot::new(awaitable, core.frame());
        Self {
            core,
            slot,
            cancel_pending: false,
        }
    }

    /// Ends the task: the body is dropped by its frame.
    fn unwind(&self) -> Poll<Result<A::Output>> {
        self.slot.state.set(SlotState::Done);
        self.core.unpark();
        self.core.begin_unwind();
        Poll::Pending
    }

    fn start(&mut self) -> Poll<Result<A::Output>> {
        let slot = Rc::clone(&self.slot);
        if let Some(executor) = self.core.executor() {
            slot.awaitable.borrow_mut().set_executor(&executor);
        }

        if self.core.is_cancel_requested() {
            if slot.awaitable.borrow_mut().early_cancel() {
                return self.unwind();
            }
            self.cancel_pending = true;
        }

        if slot.awaitable.borrow().ready() {
            if self.cancel_pending && !slot.awaitable.borrow().must_resume() {
                return self.unwind();
            }
            slot.state.set(SlotState::Done);
            return Poll::Ready(slot.awaitable.borrow_mut().resume());
        }

        slot.state.set(SlotState::Suspended);
        self.core.park(Rc::clone(&slot) as Rc<dyn Parked>);
        let next = slot.awaitable.borrow_mut().suspend(slot.me.clone());
        match next {
            Err(err) => {
                slot.state.set(SlotState::Done);
                self.core.unpark();
                return Poll::Ready(Err(err));
            }
            Ok(next) if next.ptr_eq(&slot.me) => slot.resumed.set(true),
            Ok(next) => next.resume(),
        }

        if self.cancel_pending && slot.resumed.get() {
            slot.state.set(SlotState::Cancelling);
        } else if self.cancel_pending || self.core.is_cancel_requested() {
            if slot.cancel() {
                return self.unwind();
            }
        }
        self.check()
    }

    fn check(&mut self) -> Poll<Result<A::Output>> {
        let slot = &self.slot;
        if !slot.resumed.get() {
            return Poll::Pending;
        }
        self.core.unpark();
        let state = slot.state.replace(SlotState::Done);
        if state == SlotState::Cancelling && !slot.awaitable.borrow().must_resume() {
            return self.unwind();
        }
        Poll::Ready(slot.awaitable.borrow_mut().resume())
    }
}

impl<A: Awaitable + 'static> Future for Wait<A> {
    type Output = Result<A::Output>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.slot.state.get() {
            SlotState::Idle => this.start(),
            SlotState::Suspended | SlotState::Cancelling => this.check(),
            SlotState::Done => Poll::Ready(Err(Error::protocol("wait polled after completion"))),
        }
    }
}

impl<A: Awaitable> fmt::Debug for Wait<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wait")
            .field("state", &self.slot.state.get())
            .field("resumed", &self.slot.resumed.get())
            .finish_non_exhaustive()
    }
}
