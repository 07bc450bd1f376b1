//! Per-child frames of a multiplexer.
//!
//! A [`MuxHelper`] drives one child awaitable on behalf of a
//! [`MuxCore`]. It is the child's parent frame: the child resumes the helper,
//! the helper harvests the result into its slot and reports to the
//! multiplexer.
//!
//! # States
//!
//! ```text
//! NotStarted ──suspend──▶ Running ──resume──▶ Succeeded | Failed
//!     │  └──ready──▶ Ready ──▶ Succeeded | Failed
//!     │                  │
//!   cancel            cancel
//!     ▼                  ▼
//! Cancelled         Cancelling ──resume──▶ Cancelled (clean)
//!  (early)                       └───────▶ Succeeded | Failed (must resume)
//!     or
//! CancellationPending ──suspend──▶ Cancelling | Ready | Cancelled
//! ```
//!
//! A child cancelled before it is bound stays `Cancelled` without reporting;
//! the report is delivered later by [`MuxChild::suspend`] or
//! [`MuxChild::report_immediate_result`].
//!
//! Resumes and cancels that arrive while the helper is inside a call to its
//! own awaitable are latched and processed when that call returns.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::awaiter::{Awaitable, Sanitized};
use crate::combinator::mux::{MuxChild, MuxCore};
use crate::error::Error;
use crate::runtime::executor::Executor;
use crate::runtime::frame::{Frame, FrameState, Handle};
use crate::tracing_compat::trace;
use crate::types::{Optional, PointerBits};

/// The frame driving one child of a multiplexer.
pub struct MuxHelper<A: Awaitable> {
    awaitable: RefCell<Sanitized<A>>,
    link: PointerBits<MuxCore, { FrameState::BITS }>,
    result: RefCell<Optional<A::Output>>,
    index: usize,
    busy: Cell<bool>,
    resume_latched: Cell<bool>,
    cancel_latched: Cell<bool>,
    me: Handle,
}

impl<A: Awaitable + 'static> MuxHelper<A> {
    /// Wraps child `index`.
    #[must_use]
    pub fn new(awaitable: A, index: usize) -> Rc<Self> {
        Rc::new_cyclic(|me: &Weak<Self>| Self {
            awaitable: RefCell::new(Sanitized::new(awaitable)),
            link: PointerBits::new(FrameState::NotStarted.to_bits()),
            result: RefCell::new(Optional::none()),
            index,
            busy: Cell::new(false),
            resume_latched: Cell::new(false),
            cancel_latched: Cell::new(false),
            me: Handle::from_weak(me),
        })
    }
}

impl<A: Awaitable> MuxHelper<A> {
    /// Removes the harvested value, if any.
    pub fn take_result(&self) -> Option<A::Output> {
        self.result.borrow_mut().take()
    }

    /// Returns true if a value is stored.
    #[must_use]
    pub fn has_result(&self) -> bool {
        self.result.borrow().has_value()
    }

    fn set_state(&self, next: FrameState) {
        let current = self.state_bits();
        debug_assert!(
            current.can_transition_to(next),
            "mux helper {} left terminal state {current} for {next}",
            self.index
        );
        self.link.set_bits(next.to_bits());
    }

    fn state_bits(&self) -> FrameState {
        FrameState::from_bits(self.link.bits())
    }

    fn with_busy<R>(&self, f: impl FnOnce() -> R) -> R {
        let was = self.busy.replace(true);
        let out = f();
        self.busy.set(was);
        out
    }

    fn report(&self, error: Option<Error>) {
        match self.link.upgrade() {
            Some(mux) => mux.invoke(self.index, error),
            None => {
                trace!(index = self.index, "mux helper finished after its mux");
            }
        }
    }

    fn process_latched(&self) {
        if self.resume_latched.take() {
            self.on_resume();
        }
        if self.cancel_latched.take() {
            self.cancel();
        }
    }

    fn kick_off(&self) {
        let next = self.with_busy(|| self.awaitable.borrow_mut().suspend(self.me.clone()));
        match next {
            Err(err) => {
                self.resume_latched.set(false);
                self.set_state(FrameState::Failed);
                self.report(Some(err));
            }
            Ok(next) if next.ptr_eq(&self.me) => self.resume_latched.set(true),
            Ok(next) => next.resume(),
        }
        self.process_latched();
    }

    fn harvest(&self) {
        let outcome = self.with_busy(|| self.awaitable.borrow_mut().resume());
        match outcome {
            Ok(value) => {
                self.result.borrow_mut().emplace(value);
                self.set_state(FrameState::Succeeded);
                self.report(None);
            }
            Err(err) => {
                self.set_state(FrameState::Failed);
                self.report(Some(err));
            }
        }
    }

    fn on_resume(&self) {
        match self.state_bits() {
            FrameState::Running | FrameState::Ready => self.harvest(),
            FrameState::Cancelling => {
                if self.with_busy(|| self.awaitable.borrow().must_resume()) {
                    self.harvest();
                } else {
                    self.set_state(FrameState::Cancelled);
                    self.report(None);
                }
            }
            _ => {
                trace!(index = self.index, state = %self.state_bits(), "stale resume ignored");
            }
        }
    }

    fn cancel_running(&self) -> bool {
        self.set_state(FrameState::Cancelling);
        let cancelled = self.with_busy(|| self.awaitable.borrow_mut().cancel(self.me.clone()));
        if cancelled {
            self.resume_latched.set(false);
            self.set_state(FrameState::Cancelled);
            self.report(None);
            true
        } else {
            self.process_latched();
            false
        }
    }
}

impl<A: Awaitable> MuxChild for MuxHelper<A> {
    fn index(&self) -> usize {
        self.index
    }

    fn state(&self) -> FrameState {
        self.state_bits()
    }

    fn bind(&self, mux: &Rc<MuxCore>) {
        self.link.set_ptr(mux);
    }

    fn set_executor(&self, executor: &Executor) {
        self.awaitable.borrow_mut().set_executor(executor);
    }

    fn suspend(&self) {
        match self.state_bits() {
            FrameState::Cancelled => self.report(None),
            FrameState::NotStarted => {
                if self.awaitable.borrow().ready() {
                    self.set_state(FrameState::Ready);
                    self.harvest();
                } else {
                    self.set_state(FrameState::Running);
                    self.kick_off();
                }
            }
            FrameState::CancellationPending => {
                if self.awaitable.borrow().ready() {
                    if self.with_busy(|| self.awaitable.borrow().must_resume()) {
                        self.set_state(FrameState::Ready);
                        self.harvest();
                    } else {
                        self.set_state(FrameState::Cancelled);
                        self.report(None);
                    }
                    return;
                }
                self.set_state(FrameState::Cancelling);
                self.kick_off();
                if self.state_bits() == FrameState::Cancelling {
                    let cancelled =
                        self.with_busy(|| self.awaitable.borrow_mut().cancel(self.me.clone()));
                    if cancelled {
                        self.resume_latched.set(false);
                        self.set_state(FrameState::Cancelled);
                        self.report(None);
                    } else {
                        self.process_latched();
                    }
                }
            }
            state => debug_assert!(false, "mux helper {} suspended in state {state}", self.index),
        }
    }

    fn cancel(&self) -> bool {
        if self.busy.get() {
            self.cancel_latched.set(true);
            return false;
        }
        match self.state_bits() {
            FrameState::NotStarted => {
                if self.with_busy(|| self.awaitable.borrow_mut().early_cancel()) {
                    trace!(index = self.index, "mux child skipped");
                    self.set_state(FrameState::Cancelled);
                    true
                } else {
                    self.set_state(FrameState::CancellationPending);
                    false
                }
            }
            FrameState::Running => self.cancel_running(),
            FrameState::Cancelled => true,
            _ => false,
        }
    }

    fn report_immediate_result(&self) {
        if self.state_bits() == FrameState::Cancelled {
            self.report(None);
        }
    }
}

impl<A: Awaitable> Frame for MuxHelper<A> {
    fn resume(&self) {
        if self.busy.get() {
            self.resume_latched.set(true);
            return;
        }
        self.on_resume();
    }

    fn parent(&self) -> Option<Handle> {
        self.link.upgrade().map(|mux| mux.parent_handle())
    }
}

impl<A: Awaitable> fmt::Debug for MuxHelper<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MuxHelper")
            .field("index", &self.index)
            .field("state", &self.state_bits())
            .field("has_result", &self.has_result())
            .finish_non_exhaustive()
    }
}
