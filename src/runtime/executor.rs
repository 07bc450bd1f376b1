//! The single-threaded cooperative executor.
//!
//! An executor is a FIFO of resume [`Handle`]s plus the event sources that
//! feed it: a timer heap, a list of idle watchers, and the waker set used by
//! foreign futures. It is created once per [`Runtime::block_on`] call and
//! dropped when that call returns; nothing is process-wide.
//!
//! Handles posted in order A then B resume in order A then B. There is no
//! fairness across awaitables that re-post their own continuations.
//!
//! # Run loop
//!
//! Each iteration of [`Executor::run_until`]:
//!
//! 1. returns if the predicate holds, the stop flag is set, or the step limit
//!    is reached;
//! 2. re-posts tasks woken through a foreign `Waker`;
//! 3. pops and resumes one handle;
//! 4. when the queue is empty, resumes idle watchers, then advances the clock
//!    to the next timer and posts every expired timer in deadline order;
//! 5. returns [`RunExit::Idle`] when nothing can make progress.
//!
//! [`Runtime::block_on`]: crate::runtime::Runtime::block_on

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Waker;
use std::time::Instant;

use crate::runtime::config::{ClockMode, RuntimeConfig};
use crate::runtime::frame::Handle;
use crate::runtime::timer::TimerHeap;
use crate::runtime::waker::WakeQueue;
use crate::tracing_compat::{debug, trace};
use crate::types::{TaskId, Time, TimerId};

/// Why [`Executor::run_until`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The predicate became true.
    Satisfied,
    /// [`Executor::stop`] was called.
    Stopped,
    /// Nothing was runnable, no timer was pending, and no watcher progressed.
    Idle,
    /// The configured step limit was reached.
    StepLimit,
}

/// Shared flag marking every awaitable bound to an executor as abandoned.
///
/// Sanitized awaitables take a clone when they are bound; once the flag is
/// set, dropping them mid-suspension is not reported as a protocol violation.
#[derive(Debug, Clone, Default)]
pub struct AbandonToken(Rc<Cell<bool>>);

impl AbandonToken {
    /// Returns true once the owning executor abandoned its pending work.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.0.get()
    }

    fn abandon(&self) {
        self.0.set(true);
    }
}

/// A thread-safe handle that stops an executor from outside its thread.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Requests the executor to stop after the current handle returns.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }
}

enum Clock {
    Virtual(Cell<Time>),
    Realtime(Instant),
}

impl Clock {
    fn now(&self) -> Time {
        match self {
            Self::Virtual(now) => now.get(),
            Self::Realtime(start) => {
                let nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
                Time::from_nanos(nanos)
            }
        }
    }

    fn advance_to(&self, deadline: Time) {
        match self {
            Self::Virtual(now) => {
                if deadline > now.get() {
                    now.set(deadline);
                }
            }
            Self::Realtime(_) => {
                let now = self.now();
                if deadline > now {
                    std::thread::sleep(deadline.duration_since(now));
                }
            }
        }
    }
}

struct Inner {
    name: String,
    ready: RefCell<VecDeque<Handle>>,
    idle: RefCell<Vec<Handle>>,
    timers: RefCell<TimerHeap>,
    clock: Clock,
    stop: Arc<AtomicBool>,
    abandon: AbandonToken,
    wakers: Arc<WakeQueue>,
    tasks: RefCell<HashMap<TaskId, Handle>>,
    next_task: Cell<u64>,
    steps: Cell<u64>,
    max_steps: Option<u64>,
}

/// A single-threaded FIFO dispatcher of resume handles.
///
/// Cloning is cheap; all clones refer to the same queue.
#[derive(Clone)]
pub struct Executor {
    inner: Rc<Inner>,
}

impl Executor {
    /// Creates an executor with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&RuntimeConfig::default())
    }

    /// Creates an executor from a configuration.
    #[must_use]
    pub fn with_config(config: &RuntimeConfig) -> Self {
        let clock = match config.clock {
            ClockMode::Virtual => Clock::Virtual(Cell::new(Time::ZERO)),
            ClockMode::Realtime => Clock::Realtime(Instant::now()),
        };
        Self {
            inner: Rc::new(Inner {
                name: config.name.clone(),
                ready: RefCell::new(VecDeque::new()),
                idle: RefCell::new(Vec::new()),
                timers: RefCell::new(TimerHeap::new()),
                clock,
                stop: Arc::new(AtomicBool::new(false)),
                abandon: AbandonToken::default(),
                wakers: Arc::new(WakeQueue::new()),
                tasks: RefCell::new(HashMap::new()),
                next_task: Cell::new(1),
                steps: Cell::new(0),
                max_steps: config.max_steps,
            }),
        }
    }

    /// The run label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Appends a resume handle to the ready queue.
    pub fn post(&self, handle: Handle) {
        self.inner.ready.borrow_mut().push_back(handle);
    }

    /// Removes a queued handle that has not run yet. Returns true if it was
    /// found.
    pub fn unpost(&self, handle: &Handle) -> bool {
        let mut ready = self.inner.ready.borrow_mut();
        match ready.iter().position(|h| h.ptr_eq(handle)) {
            Some(pos) => {
                ready.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Number of handles waiting in the ready queue.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.ready.borrow().len()
    }

    /// Registers `handle` to be resumed once the ready queue next drains.
    ///
    /// Watchers are one-shot; a watcher that wants to be polled again
    /// re-registers from its resume.
    pub fn on_idle(&self, handle: Handle) {
        self.inner.idle.borrow_mut().push(handle);
    }

    /// Current executor time.
    #[must_use]
    pub fn now(&self) -> Time {
        self.inner.clock.now()
    }

    /// Schedules `handle` to be posted once the clock reaches `deadline`.
    pub fn schedule_at(&self, deadline: Time, handle: Handle) -> TimerId {
        self.inner.timers.borrow_mut().insert(deadline, handle)
    }

    /// Cancels a timer. Returns true if it had not fired yet.
    pub fn cancel_timer(&self, id: TimerId) -> bool {
        self.inner.timers.borrow_mut().cancel(id)
    }

    /// Sets the stop flag. The handle currently running completes; the run
    /// loop then returns without draining the rest of the queue.
    pub fn stop(&self) {
        self.inner.stop.store(true, Ordering::Release);
    }

    /// Returns a `Send` handle that can stop this executor from any thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.inner.stop))
    }

    /// Returns true if the stop flag is set.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.stop.load(Ordering::Acquire)
    }

    /// The token shared with every awaitable bound to this executor.
    #[must_use]
    pub fn abandon_token(&self) -> AbandonToken {
        self.inner.abandon.clone()
    }

    /// Tells every bound awaitable that its pending work will never complete,
    /// and drops all queued handles and timers.
    #[cfg_attr(not(feature = "tracing-integration"), allow(unused_variables))]
    pub fn abandon_all(&self) {
        self.inner.abandon.abandon();
        let dropped = self.inner.ready.borrow().len() + self.inner.timers.borrow().len();
        self.inner.ready.borrow_mut().clear();
        self.inner.idle.borrow_mut().clear();
        self.inner.timers.borrow_mut().clear();
        self.inner.wakers.close();
        debug!(executor = %self.inner.name, dropped, "abandoned pending work");
    }

    /// Number of handles resumed so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.inner.steps.get()
    }

    /// Allocates a task id and registers the task's frame so that foreign
    /// wakers can re-post it.
    pub(crate) fn register_task(&self, handle: Handle) -> TaskId {
        let raw = self.inner.next_task.get();
        self.inner.next_task.set(raw + 1);
        let id = TaskId::from_raw(raw);
        self.inner.tasks.borrow_mut().insert(id, handle);
        id
    }

    pub(crate) fn unregister_task(&self, id: TaskId) {
        self.inner.tasks.borrow_mut().remove(&id);
    }

    /// A `Waker` that re-posts task `id` on this executor.
    pub(crate) fn waker_for(&self, id: TaskId) -> Waker {
        self.inner.wakers.waker(id)
    }

    /// Drains the ready queue until it is empty and nothing else can make
    /// progress, or until stopped.
    pub fn run(&self) -> RunExit {
        self.run_until(|| false)
    }

    /// Runs until `done` returns true or the executor cannot continue.
    pub fn run_until(&self, mut done: impl FnMut() -> bool) -> RunExit {
        loop {
            if done() {
                return RunExit::Satisfied;
            }
            if self.is_stopped() {
                debug!(executor = %self.inner.name, "run stopped");
                return RunExit::Stopped;
            }
            if let Some(limit) = self.inner.max_steps {
                if self.inner.steps.get() >= limit {
                    debug!(executor = %self.inner.name, limit, "step limit reached");
                    return RunExit::StepLimit;
                }
            }

            self.repost_woken();

            let next = self.inner.ready.borrow_mut().pop_front();
            if let Some(handle) = next {
                self.inner.steps.set(self.inner.steps.get() + 1);
                handle.resume();
                continue;
            }

            if self.run_idle_watchers() || self.fire_next_timers() {
                continue;
            }
            if !self.inner.wakers.is_empty() {
                continue;
            }
            trace!(executor = %self.inner.name, "executor idle");
            return RunExit::Idle;
        }
    }

    fn repost_woken(&self) {
        for id in self.inner.wakers.take() {
            let handle = self.inner.tasks.borrow().get(&id).cloned();
            if let Some(handle) = handle {
                trace!(task = %id, "woken by foreign waker");
                self.post(handle);
            }
        }
    }

    /// Resumes every idle watcher once. Returns true if that made something
    /// runnable.
    fn run_idle_watchers(&self) -> bool {
        let watchers = std::mem::take(&mut *self.inner.idle.borrow_mut());
        if watchers.is_empty() {
            return false;
        }
        for watcher in watchers {
            watcher.resume();
        }
        self.pending() > 0
    }

    /// Advances the clock to the earliest deadline and posts expired timers.
    /// Returns false if no timer is pending.
    fn fire_next_timers(&self) -> bool {
        let Some(deadline) = self.inner.timers.borrow_mut().peek_deadline() else {
            return false;
        };
        self.inner.clock.advance_to(deadline);
        let now = self.now();
        let expired = self.inner.timers.borrow_mut().pop_expired(now);
        trace!(now = %now, fired = expired.len(), "timers fired");
        for handle in expired {
            self.post(handle);
        }
        true
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("name", &self.inner.name)
            .field("pending", &self.pending())
            .field("timers", &self.inner.timers.borrow().len())
            .field("now", &self.now())
            .field("steps", &self.inner.steps.get())
            .finish_non_exhaustive()
    }
}
