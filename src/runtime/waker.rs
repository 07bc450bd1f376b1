//! Wakers for foreign futures.
//!
//! Runtime awaitables resume their tasks through [`Handle`]s and never touch
//! the `Waker`. A task body may still await an ordinary Rust future; such a
//! future wakes the task through a standard `Waker`, which queues the task id
//! here. The executor takes the queue on every pass and re-posts the tasks.
//!
//! Wakers are `Send` and may fire from other threads. A task is queued at most
//! once between two takes, and once the run is abandoned further wakes are
//! dropped.
//!
//! [`Handle`]: crate::runtime::frame::Handle

use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::Arc;
use std::task::{Wake, Waker};

use crate::types::TaskId;

/// Task ids woken since the executor last looked.
pub(crate) type Woken = SmallVec<[TaskId; 4]>;

#[derive(Debug, Default)]
struct Pending {
    woken: Woken,
    closed: bool,
}

/// Queue of wakes from foreign futures, shared with every waker it hands out.
#[derive(Debug, Default)]
pub struct WakeQueue {
    pending: Mutex<Pending>,
}

impl WakeQueue {
    /// An empty, open queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A `Waker` that queues `task` when woken.
    #[must_use]
    pub fn waker(self: &Arc<Self>, task: TaskId) -> Waker {
        Waker::from(Arc::new(ForeignWaker {
            queue: Arc::clone(self),
            task,
        }))
    }

    /// Takes the queued ids in wake order.
    pub(crate) fn take(&self) -> Woken {
        std::mem::take(&mut self.pending.lock().woken)
    }

    /// True if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().woken.is_empty()
    }

    /// Drops queued wakes and ignores every later one.
    pub fn close(&self) {
        let mut pending = self.pending.lock();
        pending.closed = true;
        pending.woken.clear();
    }

    fn push(&self, task: TaskId) {
        let mut pending = self.pending.lock();
        if pending.closed || pending.woken.contains(&task) {
            return;
        }
        pending.woken.push(task);
    }
}

struct ForeignWaker {
    queue: Arc<WakeQueue>,
    task: TaskId,
}

impl Wake for ForeignWaker {
    fn wake(self: Arc<Self>) {
        self.queue.push(self.task);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.queue.push(self.task);
    }
}
