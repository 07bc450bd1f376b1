//! `most_of`: wait for every child, tolerating cancellations.
//!
//! Like [`all_of`](super::all_of()), every child runs to a terminal state,
//! but a child that ends cancelled yields `None` instead of failing the whole
//! combinator. A child error still cancels the rest and is re-raised.

use crate::awaiter::Awaitable;
use crate::combinator::mux::ReadyRule;
use crate::combinator::set::{forward_mux_protocol, range_set, IntoMuxSet, Mux, MuxSet};
use crate::combinator::MuxHelper;
use crate::error::Result;

/// Waits for every child; cancelled children yield `None`.
#[derive(Debug)]
pub struct MostOf<S: MuxSet> {
    mux: Mux<S>,
}

/// `MostOf` over a homogeneous range.
pub type MostOfRange<A> = MostOf<Vec<std::rc::Rc<MuxHelper<A>>>>;

/// Runs every awaitable of the tuple concurrently and yields whatever each
/// produced.
pub fn most_of<T: IntoMuxSet>(children: T) -> MostOf<T::Set> {
    MostOf {
        mux: Mux::new(children.into_mux_set(), ReadyRule::All),
    }
}

/// Runs every awaitable of the range concurrently and yields whatever each
/// produced, in range order.
pub fn most_of_range<I>(range: I) -> MostOfRange<I::Item>
where
    I: IntoIterator,
    I::Item: Awaitable + 'static,
{
    MostOf {
        mux: Mux::new(range_set(range), ReadyRule::All),
    }
}

impl<S: MuxSet> MostOf<S> {
    /// The underlying multiplexer.
    #[must_use]
    pub fn mux(&self) -> &Mux<S> {
        &self.mux
    }
}

impl<S: MuxSet> Awaitable for MostOf<S> {
    type Output = S::Options;
    type Suspend = bool;

    const SKIPPABLE: bool = S::SKIPPABLE;

    forward_mux_protocol!();

    fn await_must_resume(&self) -> bool {
        self.mux.core().any_result()
    }

    fn await_resume(&mut self) -> Result<S::Options> {
        match self.mux.core().take_error() {
            Some(err) => Err(err),
            None => Ok(self.mux.set().take_options()),
        }
    }
}
