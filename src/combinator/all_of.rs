//! `all_of`: every child must produce a value.
//!
//! The first failure cancels the remaining children and is re-raised once
//! they have all settled. If the combinator is cancelled from outside and
//! some child ends up without a value, `await_resume` fails with
//! [`ErrorKind::Cancelled`](crate::error::ErrorKind::Cancelled).

use crate::awaiter::Awaitable;
use crate::combinator::mux::ReadyRule;
use crate::combinator::set::{forward_mux_protocol, range_set, IntoMuxSet, Mux, MuxSet};
use crate::combinator::MuxHelper;
use crate::error::{Error, Result};

/// Waits for every child to produce a value.
#[derive(Debug)]
pub struct AllOf<S: MuxSet> {
    mux: Mux<S>,
}

/// `AllOf` over a homogeneous range.
pub type AllOfRange<A> = AllOf<Vec<std::rc::Rc<MuxHelper<A>>>>;

/// Runs every awaitable of the tuple concurrently and yields all values.
pub fn all_of<T: IntoMuxSet>(children: T) -> AllOf<T::Set> {
    AllOf {
        mux: Mux::new(children.into_mux_set(), ReadyRule::All),
    }
}

/// Runs every awaitable of the range concurrently and yields all values, in
/// range order.
pub fn all_of_range<I>(range: I) -> AllOfRange<I::Item>
where
    I: IntoIterator,
    I::Item: Awaitable + 'static,
{
    AllOf {
        mux: Mux::new(range_set(range), ReadyRule::All),
    }
}

impl<S: MuxSet> AllOf<S> {
    /// The underlying multiplexer.
    #[must_use]
    pub fn mux(&self) -> &Mux<S> {
        &self.mux
    }
}

impl<S: MuxSet> Awaitable for AllOf<S> {
    type Output = S::Values;
    type Suspend = bool;

    const SKIPPABLE: bool = S::SKIPPABLE;

    forward_mux_protocol!();

    fn await_must_resume(&self) -> bool {
        let core = self.mux.core();
        core.has_error() || core.all_succeeded()
    }

    fn await_resume(&mut self) -> Result<S::Values> {
        if let Some(err) = self.mux.core().take_error() {
            return Err(err);
        }
        self.mux.set().take_values().ok_or_else(Error::cancelled)
    }
}
