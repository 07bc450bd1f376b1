//! A one-shot event.
//!
//! An [`Event`] starts untriggered. [`Event::trigger`] flips it once and
//! resumes every waiter in registration order; later waits complete
//! immediately.
//!
//! # Cancel Safety
//!
//! [`EventWait`] is skippable and abortable: cancelling a waiter removes it
//! from the list, and a cancelled waiter is never resumed.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::awaiter::Awaitable;
use crate::error::Result;
use crate::runtime::frame::Handle;
use crate::tracing_compat::trace;

struct EventState {
    triggered: Cell<bool>,
    next_waiter: Cell<u64>,
    waiters: RefCell<SmallVec<[(u64, Handle); 4]>>,
}

/// A one-shot, single-threaded event.
///
/// Cloning is cheap; all clones refer to the same event.
#[derive(Clone)]
pub struct Event {
    state: Rc<EventState>,
}

impl Event {
    /// Creates an untriggered event.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Rc::new(EventState {
                triggered: Cell::new(false),
                next_waiter: Cell::new(0),
                waiters: RefCell::new(SmallVec::new()),
            }),
        }
    }

    /// Triggers the event and resumes every waiter. Idempotent.
    pub fn trigger(&self) {
        if self.state.triggered.replace(true) {
            return;
        }
        let waiters = std::mem::take(&mut *self.state.waiters.borrow_mut());
        trace!(waiters = waiters.len(), "event triggered");
        for (_, handle) in waiters {
            handle.resume();
        }
    }

    /// Returns true once [`trigger`](Self::trigger) has been called.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.state.triggered.get()
    }

    /// Number of suspended waiters.
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.state.waiters.borrow().len()
    }

    /// Waits for the event.
    #[must_use]
    pub fn wait(&self) -> EventWait {
        EventWait {
            state: Rc::clone(&self.state),
            key: None,
        }
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("triggered", &self.is_triggered())
            .field("waiters", &self.waiters())
            .finish()
    }
}

/// Awaitable returned by [`Event::wait`].
pub struct EventWait {
    state: Rc<EventState>,
    key: Option<u64>,
}

impl Awaitable for EventWait {
    type Output = ();
    type Suspend = bool;

    const SKIPPABLE: bool = true;
    const ABORTABLE: bool = true;
    const CANCEL_IS_CLEAN: bool = true;

    fn await_ready(&self) -> bool {
        self.state.triggered.get()
    }

    fn await_suspend(&mut self, parent: Handle) -> bool {
        if self.state.triggered.get() {
            return false;
        }
        let key = self.state.next_waiter.get();
        self.state.next_waiter.set(key + 1);
        self.state.waiters.borrow_mut().push((key, parent));
        self.key = Some(key);
        true
    }

    fn await_resume(&mut self) -> Result<()> {
        self.key = None;
        Ok(())
    }

    fn await_cancel(&mut self, _parent: Handle) -> bool {
        if let Some(key) = self.key.take() {
            self.state.waiters.borrow_mut().retain(|(k, _)| *k != key);
        }
        true
    }
}

impl fmt::Debug for EventWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventWait")
            .field("registered", &self.key.is_some())
            .finish_non_exhaustive()
    }
}
