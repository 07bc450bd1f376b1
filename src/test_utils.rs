//! Test utilities for Oxco.
//!
//! This module provides shared helpers for unit tests:
//! - Consistent tracing-based logging initialization
//! - Runtime constructors and a runner for task bodies
//! - [`Scripted`], a hand-driven leaf awaitable
//! - [`Driver`], which plays the parent role for one awaitable
//!
//! # Example
//! ```ignore
//! use oxco::test_utils::{init_test_logging, run_test};
//!
//! init_test_logging();
//! let v = run_test(|cx| async move {
//!     cx.yield_now().await?;
//!     Ok(7)
//! });
//! assert_eq!(v, 7);
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, Once};

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::awaiter::{Awaitable, Sanitized};
use crate::cx::Cx;
use crate::error::{Error, Result};
use crate::runtime::executor::Executor;
use crate::runtime::frame::{Handle, ProxyFrame};
use crate::runtime::{ClockMode, Runtime, RuntimeBuilder};

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Installs a test-writer subscriber at TRACE, unless `RUST_LOG` is set.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Like [`init_test_logging`] with a different fallback level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Acquire the global environment lock for tests that mutate env vars.
#[allow(dead_code)]
pub(crate) fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// A virtual-clock runtime with a generous step limit, so that a livelock
/// fails the test instead of hanging it.
///
/// # Panics
///
/// Never in practice; the builder is given only valid values.
#[must_use]
pub fn test_runtime() -> Runtime {
    RuntimeBuilder::new()
        .clock(ClockMode::Virtual)
        .max_steps(1_000_000)
        .name("oxco-test")
        .build()
        .expect("failed to build test runtime")
}

/// Runs a task body on [`test_runtime`] and returns its value.
///
/// # Panics
///
/// Panics if the body fails or the run does not complete.
pub fn run_test<T, F, Fut>(f: F) -> T
where
    T: 'static,
    F: FnOnce(Cx) -> Fut,
    Fut: Future<Output = Result<T>> + 'static,
{
    init_test_logging();
    match test_runtime().run(f) {
        Ok(value) => value,
        Err(err) => panic!("test body failed: {err}"),
    }
}

struct ScriptState<T> {
    parent: RefCell<Handle>,
    outcome: RefCell<Option<Result<T>>>,
    abortable: Cell<bool>,
    skippable: Cell<bool>,
    suspends: Cell<u32>,
    cancels: Cell<u32>,
    resumes: Cell<u32>,
    log: RefCell<Option<(Rc<RefCell<Vec<usize>>>, usize)>>,
}

/// A leaf awaitable completed by hand through its [`ScriptHandle`].
///
/// Cancellation behaviour is configured at run time: by default early cancel
/// and cancel are both refused, and `await_must_resume` is true exactly when
/// an outcome has been delivered.
pub struct Scripted<T> {
    state: Rc<ScriptState<T>>,
}

/// The controlling side of a [`Scripted`].
pub struct ScriptHandle<T> {
    state: Rc<ScriptState<T>>,
}

impl<T> Clone for ScriptHandle<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

/// Creates a scripted awaitable that is not ready.
#[must_use]
pub fn scripted<T>() -> (Scripted<T>, ScriptHandle<T>) {
    let state = Rc::new(ScriptState {
        parent: RefCell::new(Handle::noop()),
        outcome: RefCell::new(None),
        abortable: Cell::new(false),
        skippable: Cell::new(false),
        suspends: Cell::new(0),
        cancels: Cell::new(0),
        resumes: Cell::new(0),
        log: RefCell::new(None),
    });
    (
        Scripted {
            state: Rc::clone(&state),
        },
        ScriptHandle { state },
    )
}

/// Creates a scripted awaitable that is ready with `value`.
#[must_use]
pub fn ready_scripted<T>(value: T) -> (Scripted<T>, ScriptHandle<T>) {
    let (p, h) = scripted();
    *h.state.outcome.borrow_mut() = Some(Ok(value));
    (p, h)
}

impl<T> ScriptHandle<T> {
    /// Accept cancels synchronously from now on.
    #[must_use]
    pub fn abortable(self) -> Self {
        self.state.abortable.set(true);
        self
    }

    /// Accept early cancels from now on.
    #[must_use]
    pub fn skippable(self) -> Self {
        self.state.skippable.set(true);
        self
    }

    /// Appends `index` to `log` when the awaitable is suspended.
    #[must_use]
    pub fn record_into(self, log: &Rc<RefCell<Vec<usize>>>, index: usize) -> Self {
        *self.state.log.borrow_mut() = Some((Rc::clone(log), index));
        self
    }

    /// Delivers a value and resumes the parent.
    pub fn complete(&self, value: T) {
        self.deliver(Ok(value));
    }

    /// Delivers an error and resumes the parent.
    pub fn fail(&self, err: Error) {
        self.deliver(Err(err));
    }

    /// Resumes the parent without an outcome (a cancel that produced nothing).
    pub fn wake(&self) {
        let parent = self.state.parent.replace(Handle::noop());
        parent.resume();
    }

    fn deliver(&self, outcome: Result<T>) {
        *self.state.outcome.borrow_mut() = Some(outcome);
        self.wake();
    }

    /// Returns true while a parent is installed.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        !self.state.parent.borrow().is_noop()
    }

    /// Number of `await_suspend` calls.
    #[must_use]
    pub fn suspends(&self) -> u32 {
        self.state.suspends.get()
    }

    /// Number of `await_cancel` calls.
    #[must_use]
    pub fn cancels(&self) -> u32 {
        self.state.cancels.get()
    }

    /// Number of `await_resume` calls.
    #[must_use]
    pub fn resumes(&self) -> u32 {
        self.state.resumes.get()
    }
}

impl<T> Awaitable for Scripted<T> {
    type Output = T;
    type Suspend = ();

    fn await_ready(&self) -> bool {
        self.state.outcome.borrow().is_some()
    }

    fn await_suspend(&mut self, parent: Handle) {
        self.state.suspends.set(self.state.suspends.get() + 1);
        if let Some((log, index)) = &*self.state.log.borrow() {
            log.borrow_mut().push(*index);
        }
        *self.state.parent.borrow_mut() = parent;
    }

    fn await_resume(&mut self) -> Result<T> {
        self.state.resumes.set(self.state.resumes.get() + 1);
        self.state
            .outcome
            .borrow_mut()
            .take()
            .unwrap_or_else(|| Err(Error::cancelled()))
    }

    fn await_early_cancel(&mut self) -> bool {
        self.state.skippable.get()
    }

    fn await_cancel(&mut self, _parent: Handle) -> bool {
        self.state.cancels.set(self.state.cancels.get() + 1);
        if self.state.abortable.get() {
            *self.state.parent.borrow_mut() = Handle::noop();
            true
        } else {
            false
        }
    }

    fn await_must_resume(&self) -> bool {
        self.state.outcome.borrow().is_some()
    }
}

impl<T> fmt::Debug for Scripted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scripted")
            .field("suspends", &self.state.suspends.get())
            .field("cancels", &self.state.cancels.get())
            .finish_non_exhaustive()
    }
}

/// Drives one awaitable through the protocol by hand, standing in for its
/// parent frame.
pub struct Driver<A: Awaitable> {
    awaitable: Sanitized<A>,
    executor: Executor,
    resumes: Rc<Cell<u32>>,
    frame: Rc<ProxyFrame>,
}

impl<A: Awaitable> Driver<A> {
    /// Binds `awaitable` to a fresh executor.
    pub fn new(awaitable: A) -> Self {
        let executor = Executor::new();
        let mut awaitable = Sanitized::new(awaitable);
        awaitable.set_executor(&executor);
        let resumes = Rc::new(Cell::new(0));
        let counter = Rc::clone(&resumes);
        let frame = ProxyFrame::new(move || counter.set(counter.get() + 1));
        Self {
            awaitable,
            executor,
            resumes,
            frame,
        }
    }

    /// The parent handle given to the awaitable.
    #[must_use]
    pub fn handle(&self) -> Handle {
        Handle::new(&self.frame)
    }

    /// The executor the awaitable is bound to.
    #[must_use]
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// The wrapped awaitable.
    #[must_use]
    pub fn get_ref(&self) -> &A {
        self.awaitable.get_ref()
    }

    /// How many times the parent was resumed, counting an immediate resume
    /// from `ready` or `suspend`.
    #[must_use]
    pub fn resumes(&self) -> u32 {
        self.resumes.get()
    }

    /// Runs `await_ready`, then `await_suspend` if needed.
    pub fn start(&mut self) -> Result<()> {
        if self.awaitable.ready() {
            self.resumes.set(self.resumes.get() + 1);
            return Ok(());
        }
        let parent = self.handle();
        let next = self.awaitable.suspend(parent.clone())?;
        if next.ptr_eq(&parent) {
            self.resumes.set(self.resumes.get() + 1);
        } else {
            next.resume();
        }
        Ok(())
    }

    /// Runs `await_early_cancel`.
    pub fn early_cancel(&mut self) -> bool {
        self.awaitable.early_cancel()
    }

    /// Runs `await_cancel`.
    pub fn cancel(&mut self) -> bool {
        let parent = self.handle();
        self.awaitable.cancel(parent)
    }

    /// Runs `await_must_resume`.
    #[must_use]
    pub fn must_resume(&self) -> bool {
        self.awaitable.must_resume()
    }

    /// Runs `await_resume`.
    pub fn finish(&mut self) -> Result<A::Output> {
        self.awaitable.resume()
    }

    /// Drains the executor.
    pub fn run(&self) {
        self.executor.run();
    }
}

impl<A: Awaitable> fmt::Debug for Driver<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("awaitable", &self.awaitable)
            .field("resumes", &self.resumes.get())
            .finish_non_exhaustive()
    }
}
