#![allow(dead_code)]
#![allow(unused_imports)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, Once};

use oxco::awaiter::Sanitized;
use oxco::runtime::{ClockMode, Executor, Handle, ProxyFrame, Runtime, RuntimeBuilder};
use oxco::{Awaitable, Cx, Error, Result};
use proptest::prelude::ProptestConfig;
use proptest::test_runner::RngSeed;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Default seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED_5EED;

const PROPTEST_SEED_ENV: &str = "OXCO_PROPTEST_SEED";

/// Build a ProptestConfig with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    let mut config = ProptestConfig::with_cases(cases);
    if matches!(config.rng_seed, RngSeed::Random) {
        if let Some(seed) = read_proptest_seed() {
            config.rng_seed = RngSeed::Fixed(seed);
        }
    }
    config
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }
    std::env::var("CI").is_ok().then_some(DEFAULT_PROPTEST_SEED)
}

/// Installs a test-writer subscriber at TRACE, unless `RUST_LOG` is set.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Like [`init_test_logging`] with a different fallback level.
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

/// Serializes tests that touch `OXCO_*` environment variables.
pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// A deterministic runtime whose step limit turns livelocks into failures.
#[must_use]
pub fn test_runtime() -> Runtime {
    RuntimeBuilder::new()
        .clock(ClockMode::Virtual)
        .max_steps(1_000_000)
        .name("oxco-it")
        .build()
        .expect("failed to build test runtime")
}

/// Runs a task body on [`test_runtime`], panicking if the run fails.
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

/// Marks the start of a test phase in the log.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "---- phase start ----");
    };
}

/// Log test completion.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "---- test passed ----");
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

// ---------------------------------------------------------------------------
// Gate: a leaf awaitable completed from the test
// ---------------------------------------------------------------------------

#[derive(Default)]
struct GateState {
    parent: RefCell<Option<Handle>>,
    outcome: RefCell<Option<Result<u32>>>,
    abortable: Cell<bool>,
    cancels: Cell<u32>,
    suspends: Cell<u32>,
}

/// A leaf awaitable that completes when its [`GateKey`] says so.
pub struct Gate {
    state: Rc<GateState>,
}

/// Completes a [`Gate`].
#[derive(Clone)]
pub struct GateKey {
    state: Rc<GateState>,
}

/// A pending gate. With `abortable`, cancels complete synchronously;
/// otherwise they are ignored until the key completes the gate.
#[must_use]
pub fn gate(abortable: bool) -> (Gate, GateKey) {
    let state = Rc::new(GateState::default());
    state.abortable.set(abortable);
    (
        Gate {
            state: Rc::clone(&state),
        },
        GateKey { state },
    )
}

impl GateKey {
    /// Delivers `outcome` and resumes the waiting parent, if any.
    pub fn open(&self, outcome: Result<u32>) {
        *self.state.outcome.borrow_mut() = Some(outcome);
        let parent = self.state.parent.borrow_mut().take();
        if let Some(parent) = parent {
            parent.resume();
        }
    }

    /// True while suspended and not yet opened or cancelled.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.state.parent.borrow().is_some()
    }

    /// Number of `await_cancel` calls.
    #[must_use]
    pub fn cancels(&self) -> u32 {
        self.state.cancels.get()
    }

    /// Number of `await_suspend` calls.
    #[must_use]
    pub fn suspends(&self) -> u32 {
        self.state.suspends.get()
    }
}

impl Awaitable for Gate {
    type Output = u32;
    type Suspend = ();

    fn await_ready(&self) -> bool {
        self.state.outcome.borrow().is_some()
    }

    fn await_suspend(&mut self, parent: Handle) {
        self.state.suspends.set(self.state.suspends.get() + 1);
        *self.state.parent.borrow_mut() = Some(parent);
    }

    fn await_resume(&mut self) -> Result<u32> {
        self.state
            .outcome
            .borrow_mut()
            .take()
            .unwrap_or_else(|| Err(Error::cancelled()))
    }

    fn await_cancel(&mut self, _parent: Handle) -> bool {
        self.state.cancels.set(self.state.cancels.get() + 1);
        if self.state.abortable.get() {
            self.state.parent.borrow_mut().take();
            true
        } else {
            false
        }
    }

    fn await_must_resume(&self) -> bool {
        self.state.outcome.borrow().is_some()
    }
}

// ---------------------------------------------------------------------------
// Manual: plays the parent of one awaitable
// ---------------------------------------------------------------------------

/// Drives one awaitable by hand and counts how often it resumes its parent.
pub struct Manual<A: Awaitable> {
    awaitable: Sanitized<A>,
    resumes: Rc<Cell<u32>>,
    frame: Rc<ProxyFrame>,
    executor: Executor,
}

impl<A: Awaitable> Manual<A> {
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
            resumes,
            frame,
            executor,
        }
    }

    fn parent(&self) -> Handle {
        Handle::new(&self.frame)
    }

    /// Runs ready/suspend, counting an immediate completion as a resume.
    pub fn start(&mut self) -> Result<()> {
        if self.awaitable.ready() {
            self.resumes.set(self.resumes.get() + 1);
            return Ok(());
        }
        let parent = self.parent();
        let next = self.awaitable.suspend(parent.clone())?;
        if next.ptr_eq(&parent) {
            self.resumes.set(self.resumes.get() + 1);
        } else {
            next.resume();
        }
        Ok(())
    }

    /// Runs `await_cancel`.
    pub fn cancel(&mut self) -> bool {
        let parent = self.parent();
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

    /// Parent resumes so far.
    #[must_use]
    pub fn resumes(&self) -> u32 {
        self.resumes.get()
    }

    /// Drains the executor.
    pub fn run(&self) {
        self.executor.run();
    }

    /// The wrapped awaitable.
    #[must_use]
    pub fn get_ref(&self) -> &A {
        self.awaitable.get_ref()
    }
}
