//! Frames, handles, and the parent chain.
//!
//! A *frame* is anything that can be resumed: a task's coroutine, a
//! multiplexer helper, or a [`ProxyFrame`] wrapping a callback. A [`Handle`]
//! is an opaque, cloneable reference to a frame that an awaitable stores
//! while suspended and resumes exactly once when it completes.
//!
//! Handles are weak. Awaitables routinely hold their parent's handle while
//! the parent owns the awaitable; a strong reference would make every
//! suspension an ownership cycle. Resuming a handle whose frame has been
//! destroyed is a traced no-op.
//!
//! The parent chain runs from leaf to root through [`Frame::parent`].
//! Completion walks it upward (child resumes parent); cancellation is driven
//! downward by whoever owns the children.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::tracing_compat::trace;

/// Lifecycle state of a frame.
///
/// The discriminants fit in three bits so the state can share a word with a
/// back-pointer (see [`PointerBits`](crate::types::PointerBits)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameState {
    /// Constructed, never suspended.
    NotStarted = 0,
    /// Cancel requested before start, and the early cancel was refused.
    CancellationPending = 1,
    /// Suspended and running.
    Running = 2,
    /// Cancel requested after suspension; waiting for the awaitable to settle.
    Cancelling = 3,
    /// Terminal: cancelled without a result.
    Cancelled = 4,
    /// A result is available and will be harvested next.
    Ready = 5,
    /// Terminal: produced a value.
    Succeeded = 6,
    /// Terminal: produced an error.
    Failed = 7,
}

impl FrameState {
    /// Number of bits needed to encode any state.
    pub const BITS: u32 = 3;

    /// Returns true for `Cancelled`, `Succeeded` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Succeeded | Self::Failed)
    }

    /// Returns true if a cancel has been requested and not yet settled.
    #[must_use]
    pub const fn is_cancel_requested(self) -> bool {
        matches!(self, Self::CancellationPending | Self::Cancelling)
    }

    /// Returns the 3-bit encoding.
    #[must_use]
    pub const fn to_bits(self) -> u8 {
        self as u8
    }

    /// Decodes a 3-bit encoding. Only the low three bits are read.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0 => Self::NotStarted,
            1 => Self::CancellationPending,
            2 => Self::Running,
            3 => Self::Cancelling,
            4 => Self::Cancelled,
            5 => Self::Ready,
            6 => Self::Succeeded,
            _ => Self::Failed,
        }
    }

    /// Returns true if moving from `self` to `next` respects terminal
    /// monotonicity: a terminal state never changes.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        !self.is_terminal() || self as u8 == next as u8
    }
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not-started",
            Self::CancellationPending => "cancellation-pending",
            Self::Running => "running",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Ready => "ready",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What kind of computation a frame represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A task driving a user coroutine.
    Coroutine,
    /// A runtime-internal frame that inserts its own resume logic
    /// (multiplexer helpers, wait slots, callbacks).
    Proxy,
}

/// A resumable computation.
pub trait Frame {
    /// Re-enters the computation.
    ///
    /// Implementations must tolerate being called while one of their own
    /// methods is on the stack (a child completing synchronously); they latch
    /// the resume and process it when the outer call returns.
    fn resume(&self);

    /// The frame to resume when this one completes, if known.
    fn parent(&self) -> Option<Handle> {
        None
    }

    /// The kind of frame.
    fn kind(&self) -> FrameKind {
        FrameKind::Proxy
    }
}

/// Classification of a [`Handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// Resuming does nothing.
    Noop,
    /// Refers to a task frame.
    Coroutine,
    /// Refers to a proxy frame.
    Proxy,
    /// Referred to a frame that no longer exists.
    Dangling,
}

/// An opaque reference to a frame.
#[derive(Clone, Default)]
pub struct Handle {
    target: Option<Weak<dyn Frame>>,
}

impl Handle {
    /// The handle that does nothing when resumed.
    ///
    /// Returned from `await_suspend` to mean "stay suspended", and installed
    /// as a multiplexer's parent while it cancels its children so that
    /// re-entrant completions cannot resume the real parent.
    #[must_use]
    pub const fn noop() -> Self {
        Self { target: None }
    }

    /// Creates a handle to `frame`.
    #[must_use]
    pub fn new<F: Frame + 'static>(frame: &Rc<F>) -> Self {
        let weak: Weak<F> = Rc::downgrade(frame);
        let target: Weak<dyn Frame> = weak;
        Self {
            target: Some(target),
        }
    }

    /// Creates a handle from a weak frame reference, typically the one
    /// `Rc::new_cyclic` hands to a frame under construction.
    #[must_use]
    pub fn from_weak<F: Frame + 'static>(frame: &Weak<F>) -> Self {
        let target: Weak<dyn Frame> = frame.clone();
        Self {
            target: Some(target),
        }
    }

    /// Returns true for the no-op handle.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.target.is_none()
    }

    /// Classifies the handle.
    #[must_use]
    pub fn kind(&self) -> HandleKind {
        match &self.target {
            None => HandleKind::Noop,
            Some(weak) => match weak.upgrade() {
                None => HandleKind::Dangling,
                Some(frame) => match frame.kind() {
                    FrameKind::Coroutine => HandleKind::Coroutine,
                    FrameKind::Proxy => HandleKind::Proxy,
                },
            },
        }
    }

    /// Resumes the referenced frame.
    pub fn resume(&self) {
        let Some(weak) = &self.target else {
            return;
        };
        match weak.upgrade() {
            Some(frame) => frame.resume(),
            None => {
                trace!("resume of a destroyed frame ignored");
            }
        }
    }

    /// Returns true if both handles refer to the same frame (or are both no-op).
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.target, &other.target) {
            (None, None) => true,
            (Some(a), Some(b)) => Weak::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The parent of the referenced frame, if any.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.target
            .as_ref()
            .and_then(Weak::upgrade)
            .and_then(|frame| frame.parent())
            .filter(|parent| !parent.is_noop())
    }

    /// Walks the parent chain from this frame towards the root, excluding
    /// this frame itself.
    pub fn ancestors(&self) -> impl Iterator<Item = Self> {
        std::iter::successors(self.parent(), Self::parent)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:?})", self.kind())
    }
}

/// A frame whose resume logic is a callback, with an optional parent link.
pub struct ProxyFrame {
    callback: Box<dyn Fn()>,
    parent: Handle,
}

impl ProxyFrame {
    /// Creates a proxy frame running `callback` on every resume.
    #[must_use]
    pub fn new(callback: impl Fn() + 'static) -> Rc<Self> {
        Self::with_parent(callback, Handle::noop())
    }

    /// Creates a proxy frame that reports `parent` in the parent chain.
    #[must_use]
    pub fn with_parent(callback: impl Fn() + 'static, parent: Handle) -> Rc<Self> {
        Rc::new(Self {
            callback: Box::new(callback),
            parent,
        })
    }
}

impl Frame for ProxyFrame {
    fn resume(&self) {
        (self.callback)();
    }

    fn parent(&self) -> Option<Handle> {
        Some(self.parent.clone())
    }
}

impl fmt::Debug for ProxyFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyFrame")
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}
