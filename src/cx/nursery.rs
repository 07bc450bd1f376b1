//! Nurseries: lifetime scopes for dynamically started tasks.
//!
//! [`Nursery::open`] returns an awaitable that runs a body task and every
//! task the body starts through its [`Nursery`] handle. It completes only
//! after all of them are terminal.
//!
//! Internally a nursery is a multiplexer that grows: the body is child 0,
//! and each [`Nursery::start`] appends, binds and starts one more helper.
//! Its ready rule cancels everything that is left as soon as the body
//! finishes or any child fails.
//!
//! ```
//! use oxco::cx::Nursery;
//!
//! let v = oxco::run(|cx| async move {
//!     let scope = Nursery::open(|n, cx| async move {
//!         n.start(|cx| async move {
//!             cx.yield_now().await?;
//!             Ok(())
//!         })?;
//!         cx.wait(n.join()).await?;
//!         Ok(3)
//!     });
//!     cx.wait(scope).await
//! });
//! assert_eq!(v.unwrap(), 3);
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use crate::awaiter::Awaitable;
use crate::combinator::{MuxChild, MuxCore, MuxHelper, MuxListener, ReadyRule};
use crate::cx::cx::Cx;
use crate::cx::task::{task, Task};
use crate::error::{Error, Result};
use crate::runtime::executor::Executor;
use crate::runtime::frame::{FrameState, Handle};
use crate::tracing_compat::{debug, trace};

const BODY: usize = 0;

struct NurseryInner {
    core: Rc<MuxCore>,
    executor: RefCell<Option<Executor>>,
    joiners: RefCell<Vec<(u64, Handle)>>,
    next_joiner: Cell<u64>,
}

impl NurseryInner {
    fn live_children(&self) -> usize {
        self.core.live_except(BODY)
    }
}

impl MuxListener for NurseryInner {
    #[cfg_attr(not(feature = "tracing-integration"), allow(unused_variables))]
    fn child_done(&self, index: usize) {
        trace!(index, live = self.live_children(), "nursery child done");
        if self.live_children() > 0 {
            return;
        }
        let joiners = std::mem::take(&mut *self.joiners.borrow_mut());
        for (_, joiner) in joiners {
            joiner.resume();
        }
    }
}

/// The handle a nursery body uses to start tasks.
///
/// Cloning is cheap. The handle does not keep the nursery alive: once the
/// nursery has completed, [`start`](Self::start) fails.
#[derive(Clone)]
pub struct Nursery {
    inner: Weak<NurseryInner>,
}

impl Nursery {
    /// Opens a nursery running `body`.
    pub fn open<T, F, Fut>(body: F) -> NurseryScope<T>
    where
        T: 'static,
        F: FnOnce(Nursery, Cx) -> Fut,
        Fut: Future<Output = Result<T>> + 'static,
    {
        let inner = Rc::new(NurseryInner {
            core: MuxCore::new(ReadyRule::Primary(BODY)),
            executor: RefCell::new(None),
            joiners: RefCell::new(Vec::new()),
            next_joiner: Cell::new(0),
        });
        let weak: Weak<NurseryInner> = Rc::downgrade(&inner);
        let listener: Weak<dyn MuxListener> = weak;
        inner.core.set_listener(listener);

        let nursery = Self {
            inner: Rc::downgrade(&inner),
        };
        let body = MuxHelper::new(task(move |cx| body(nursery, cx)), BODY);
        inner.core.push(Rc::clone(&body) as Rc<dyn MuxChild>);
        NurseryScope { inner, body }
    }

    /// Starts `f` as a child task of the nursery.
    ///
    /// The child is started immediately and runs until its first
    /// suspension before this returns. If the nursery is already cancelling,
    /// the child is cancelled before it starts.
    ///
    /// # Errors
    ///
    /// Fails if the nursery has already completed.
    pub fn start<F, Fut>(&self, f: F) -> Result<()>
    where
        F: FnOnce(Cx) -> Fut,
        Fut: Future<Output = Result<()>> + 'static,
    {
        let inner = self.live_inner()?;
        let core = &inner.core;
        let index = core.size();
        let helper = MuxHelper::new(task(f), index);
        core.push(Rc::clone(&helper) as Rc<dyn MuxChild>);
        helper.bind(core);
        if let Some(executor) = inner.executor.borrow().as_ref() {
            helper.set_executor(executor);
        }
        debug!(index, cancelling = core.is_cancelling(), "nursery child started");
        if core.is_cancelling() {
            helper.cancel();
        }
        helper.suspend();
        Ok(())
    }

    /// Waits until every started child is terminal. The body itself is not
    /// counted. Completes at once if the nursery is gone.
    pub fn join(&self) -> NurseryJoin {
        NurseryJoin {
            inner: self.inner.clone(),
            key: None,
        }
    }

    /// Number of started children that are not yet terminal.
    #[must_use]
    pub fn live(&self) -> usize {
        self.inner
            .upgrade()
            .map_or(0, |inner| inner.live_children())
    }

    fn live_inner(&self) -> Result<Rc<NurseryInner>> {
        let inner = self
            .inner
            .upgrade()
            .ok_or_else(|| Error::protocol("nursery is closed"))?;
        if inner.core.count() == inner.core.size() {
            return Err(Error::protocol("nursery is closed"));
        }
        Ok(inner)
    }
}

impl fmt::Debug for Nursery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nursery")
            .field("live", &self.live())
            .finish()
    }
}

/// The awaitable returned by [`Nursery::open`].
///
/// Yields the body's value once every child is terminal. The first error of
/// the body or any child cancels everything else and is the result.
pub struct NurseryScope<T: 'static> {
    inner: Rc<NurseryInner>,
    body: Rc<MuxHelper<Task<T>>>,
}

impl<T: 'static> NurseryScope<T> {
    /// Number of children (the body included) that are not yet terminal.
    #[must_use]
    pub fn live(&self) -> usize {
        self.inner.core.size() - self.inner.core.count()
    }
}

impl<T: 'static> Awaitable for NurseryScope<T> {
    type Output = T;
    type Suspend = bool;

    const SKIPPABLE: bool = true;

    fn await_ready(&self) -> bool {
        self.inner.core.ready()
    }

    fn await_set_executor(&mut self, executor: &Executor) {
        *self.inner.executor.borrow_mut() = Some(executor.clone());
        self.inner.core.set_executor(executor);
    }

    fn await_early_cancel(&mut self) -> bool {
        self.inner.core.early_cancel()
    }

    fn await_suspend(&mut self, parent: Handle) -> bool {
        self.inner.core.suspend(parent)
    }

    fn await_cancel(&mut self, parent: Handle) -> bool {
        debug!(live = self.live(), "nursery cancelled");
        self.inner.core.cancel(parent)
    }

    fn await_must_resume(&self) -> bool {
        self.inner.core.has_error() || self.body.state() == FrameState::Succeeded
    }

    fn await_resume(&mut self) -> Result<T> {
        if let Some(err) = self.inner.core.take_error() {
            return Err(err);
        }
        self.body.take_result().ok_or_else(Error::cancelled)
    }
}

impl<T: 'static> fmt::Debug for NurseryScope<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NurseryScope")
            .field("core", &self.inner.core)
            .field("body", &self.body)
            .finish()
    }
}

/// Awaitable returned by [`Nursery::join`].
pub struct NurseryJoin {
    inner: Weak<NurseryInner>,
    key: Option<u64>,
}

impl Awaitable for NurseryJoin {
    type Output = ();
    type Suspend = Result<bool>;

    const SKIPPABLE: bool = true;
    const ABORTABLE: bool = true;
    const CANCEL_IS_CLEAN: bool = true;

    fn await_ready(&self) -> bool {
        self.inner
            .upgrade()
            .map_or(true, |inner| inner.live_children() == 0)
    }

    fn await_suspend(&mut self, parent: Handle) -> Result<bool> {
        let inner = self
            .inner
            .upgrade()
            .ok_or_else(|| Error::protocol("nursery is closed"))?;
        if inner.live_children() == 0 {
            return Ok(false);
        }
        let key = inner.next_joiner.get();
        inner.next_joiner.set(key + 1);
        inner.joiners.borrow_mut().push((key, parent));
        self.key = Some(key);
        Ok(true)
    }

    fn await_resume(&mut self) -> Result<()> {
        self.key = None;
        Ok(())
    }

    fn await_cancel(&mut self, _parent: Handle) -> bool {
        if let (Some(key), Some(inner)) = (self.key.take(), self.inner.upgrade()) {
            inner.joiners.borrow_mut().retain(|(k, _)| *k != key);
        }
        true
    }
}

impl fmt::Debug for NurseryJoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NurseryJoin")
            .field("registered", &self.key.is_some())
            .finish_non_exhaustive()
    }
}
