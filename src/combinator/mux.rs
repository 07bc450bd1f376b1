//! The multiplexer core shared by every combinator.
//!
//! A [`MuxCore`] owns a list of children (erased [`MuxChild`]s, usually
//! [`MuxHelper`](super::helper::MuxHelper)s) and resumes its parent exactly
//! once, after every child reached a terminal state.
//!
//! # Completion
//!
//! Each child reports its terminal transition through [`MuxCore::invoke`]
//! exactly once, with the error it failed with, if any. The first error is
//! kept; later ones are dropped. When the first failure arrives, or when the
//! completion count first reaches the [`ReadyRule`] threshold, the remaining
//! children are cancelled.
//!
//! # Re-entrancy
//!
//! Cancelling a child may complete it synchronously, which re-enters
//! `invoke`. Around that cancellation sweep the count is held one below its
//! real value so that no nested `invoke` can observe `count == size` and
//! resume the parent; the outer `invoke` does it once the sweep returns.
//!
//! While the whole multiplexer is being cancelled from outside
//! ([`MuxCore::cancel`]), the parent is swapped for the no-op handle; the
//! caller learns the outcome from the return value instead.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::Error;
use crate::runtime::executor::Executor;
use crate::runtime::frame::{FrameState, Handle};
use crate::tracing_compat::trace;
use crate::util::scope_guard;

/// One child of a multiplexer, as seen by the multiplexer.
pub trait MuxChild {
    /// Position of the child in construction order.
    fn index(&self) -> usize;
    /// Current lifecycle state.
    fn state(&self) -> FrameState;
    /// Installs the back-pointer to the owning multiplexer.
    fn bind(&self, mux: &Rc<MuxCore>);
    /// Forwards the executor to the child's awaitable.
    fn set_executor(&self, executor: &Executor);
    /// Starts the child, or reports it if it was cancelled before starting.
    fn suspend(&self);
    /// Requests cancellation. Returns true if the child is now `Cancelled`.
    fn cancel(&self) -> bool;
    /// Delivers the deferred report of a child cancelled before it was bound.
    fn report_immediate_result(&self);
}

/// When a multiplexer stops waiting for further successes and cancels the
/// rest of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyRule {
    /// After the first child completes (`MinReady = min(1, size)`).
    Any,
    /// Only after every child completes (`MinReady = size`).
    All,
    /// After the child at this index completes (nursery bodies).
    Primary(usize),
}

/// Observes child completions of a multiplexer.
pub trait MuxListener {
    /// Called after the child at `index` reported its terminal state.
    fn child_done(&self, index: usize);
}

/// The aggregate state of a multiplexer.
pub struct MuxCore {
    rule: ReadyRule,
    count: Cell<usize>,
    parent: RefCell<Handle>,
    first_error: RefCell<Option<Error>>,
    children: RefCell<Vec<Rc<dyn MuxChild>>>,
    cancel_issued: Cell<bool>,
    reported: Cell<bool>,
    parent_resumes: Cell<u32>,
    listener: RefCell<Option<Weak<dyn MuxListener>>>,
    me: Weak<MuxCore>,
}

impl MuxCore {
    /// Creates an empty multiplexer.
    #[must_use]
    pub fn new(rule: ReadyRule) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            rule,
            count: Cell::new(0),
            parent: RefCell::new(Handle::noop()),
            first_error: RefCell::new(None),
            children: RefCell::new(Vec::new()),
            cancel_issued: Cell::new(false),
            reported: Cell::new(false),
            parent_resumes: Cell::new(0),
            listener: RefCell::new(None),
            me: me.clone(),
        })
    }

    /// Appends a child. Children are bound and suspended in push order.
    pub fn push(&self, child: Rc<dyn MuxChild>) {
        self.children.borrow_mut().push(child);
    }

    /// Installs a completion listener.
    pub fn set_listener(&self, listener: Weak<dyn MuxListener>) {
        *self.listener.borrow_mut() = Some(listener);
    }

    /// Number of children.
    #[must_use]
    pub fn size(&self) -> usize {
        self.children.borrow().len()
    }

    /// Number of children that reported a terminal state.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count.get()
    }

    /// The completion threshold after which the rest is cancelled.
    #[must_use]
    pub fn min_ready(&self) -> usize {
        match self.rule {
            ReadyRule::Any => self.size().min(1),
            ReadyRule::All | ReadyRule::Primary(_) => self.size(),
        }
    }

    /// Returns true once a cancellation sweep has been issued.
    #[must_use]
    pub fn is_cancelling(&self) -> bool {
        self.cancel_issued.get()
    }

    /// How many times the real parent has been resumed (0 or 1).
    #[must_use]
    pub fn parent_resumes(&self) -> u32 {
        self.parent_resumes.get()
    }

    /// The installed parent handle.
    #[must_use]
    pub fn parent_handle(&self) -> Handle {
        self.parent.borrow().clone()
    }

    /// Snapshot of the child states, in construction order.
    #[must_use]
    pub fn states(&self) -> Vec<FrameState> {
        self.snapshot().iter().map(|c| c.state()).collect()
    }

    /// Removes and returns the first captured error.
    pub fn take_error(&self) -> Option<Error> {
        self.first_error.borrow_mut().take()
    }

    /// Returns true if an error has been captured.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.first_error.borrow().is_some()
    }

    /// Returns true if every child is `Cancelled` (vacuously true when empty).
    #[must_use]
    pub fn all_cancelled(&self) -> bool {
        self.all(|s| s == FrameState::Cancelled)
    }

    /// Returns true if every child `Succeeded`.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.all(|s| s == FrameState::Succeeded)
    }

    /// Returns true if some child produced a value or an error.
    #[must_use]
    pub fn any_result(&self) -> bool {
        self.snapshot()
            .iter()
            .any(|c| matches!(c.state(), FrameState::Succeeded | FrameState::Failed))
    }

    /// Number of children not yet terminal, ignoring `skip`.
    #[must_use]
    pub fn live_except(&self, skip: usize) -> usize {
        self.snapshot()
            .iter()
            .filter(|c| c.index() != skip && !c.state().is_terminal())
            .count()
    }

    fn all(&self, pred: impl Fn(FrameState) -> bool) -> bool {
        self.snapshot().iter().all(|c| pred(c.state()))
    }

    fn snapshot(&self) -> Vec<Rc<dyn MuxChild>> {
        self.children.borrow().clone()
    }

    /// Receives the terminal report of child `index`.
    pub fn invoke(&self, index: usize, error: Option<Error>) {
        let count = self.count.get() + 1;
        self.count.set(count);
        debug_assert!(count <= self.size(), "mux child reported twice");

        let mut first_fail = false;
        if let Some(err) = error {
            let mut slot = self.first_error.borrow_mut();
            if slot.is_none() {
                trace!(index, error = %err, "mux captured first error");
                *slot = Some(err);
                first_fail = true;
            } else {
                trace!(index, error = %err, "mux dropped subsequent error");
            }
        }

        let threshold = match self.rule {
            ReadyRule::Any | ReadyRule::All => count == self.min_ready(),
            ReadyRule::Primary(primary) => index == primary,
        };
        if (first_fail || threshold) && !self.cancel_issued.get() && count < self.size() {
            trace!(index, count, size = self.size(), "mux cancelling remaining children");
            self.cancel_issued.set(true);
            self.count.set(self.count.get() - 1);
            self.internal_cancel();
            self.count.set(self.count.get() + 1);
        }

        // A listener may run the primary child to completion, which reports
        // re-entrantly and resumes the parent itself. Only the call that
        // counted the last child resumes.
        let finished = self.count.get() == self.size();
        let listener = self.listener.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(listener) = listener {
            listener.child_done(index);
        }

        if finished {
            self.resume_parent();
        }
    }

    /// Issues `cancel` to every child, in construction order.
    pub fn internal_cancel(&self) {
        for child in self.snapshot() {
            child.cancel();
        }
    }

    fn resume_parent(&self) {
        let parent = self.parent.borrow().clone();
        if parent.is_noop() {
            return;
        }
        debug_assert_eq!(self.parent_resumes.get(), 0, "mux parent resumed twice");
        self.parent_resumes.set(self.parent_resumes.get() + 1);
        trace!(size = self.size(), "mux resuming parent");
        parent.resume();
    }

    /// Readiness: true iff every child is `Cancelled`. On that path the
    /// deferred reports of children cancelled before binding are delivered.
    #[must_use]
    pub fn ready(&self) -> bool {
        if !self.all_cancelled() {
            return false;
        }
        if !self.reported.replace(true) {
            if let Some(me) = self.me.upgrade() {
                for child in self.snapshot() {
                    child.bind(&me);
                    child.report_immediate_result();
                }
            }
        }
        true
    }

    /// Forwards the executor to every child.
    pub fn set_executor(&self, executor: &Executor) {
        for child in self.snapshot() {
            child.set_executor(executor);
        }
    }

    /// Cancels every child before suspension. Returns true if all of them
    /// are now `Cancelled`.
    pub fn early_cancel(&self) -> bool {
        self.cancel_issued.set(true);
        self.internal_cancel();
        self.all_cancelled()
    }

    /// Binds and starts every child. Returns true to stay suspended, false
    /// if every child already finished and the parent may continue.
    pub fn suspend(&self, parent: Handle) -> bool {
        *self.parent.borrow_mut() = Handle::noop();
        self.reported.set(true);
        let children = self.snapshot();
        if let Some(me) = self.me.upgrade() {
            for child in &children {
                child.bind(&me);
            }
        }
        for child in &children {
            child.suspend();
        }
        if self.count.get() == self.size() {
            return false;
        }
        *self.parent.borrow_mut() = parent;
        true
    }

    /// Cancels after suspension.
    ///
    /// Returns true if every child ended `Cancelled`; the parent is then not
    /// resumed. Otherwise returns false, and the parent is resumed once the
    /// remaining children report (possibly before this returns, if they all
    /// already did).
    pub fn cancel(&self, _parent: Handle) -> bool {
        let prev = self.parent.replace(Handle::noop());
        {
            let _restore = scope_guard(|| *self.parent.borrow_mut() = prev);
            self.cancel_issued.set(true);
            self.internal_cancel();
        }
        if self.all_cancelled() {
            *self.parent.borrow_mut() = Handle::noop();
            return true;
        }
        if self.count.get() == self.size() {
            self.resume_parent();
        }
        false
    }
}

impl fmt::Debug for MuxCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MuxCore")
            .field("rule", &self.rule)
            .field("count", &self.count.get())
            .field("size", &self.size())
            .field("cancel_issued", &self.cancel_issued.get())
            .field("has_error", &self.has_error())
            .finish_non_exhaustive()
    }
}
