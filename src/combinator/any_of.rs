//! `any_of`: the first child to finish wins; the rest are cancelled.
//!
//! The result holds one `Option` per child. The winner's slot is filled;
//! losers that could not be cancelled in time may fill theirs too.
//!
//! # Cancellation
//!
//! `AnyOf` is abortable when every child is: a cancelled `AnyOf` that is
//! still suspended has no finished child, so cancelling every child
//! synchronously leaves all of them `Cancelled`.

use crate::awaiter::Awaitable;
use crate::combinator::mux::ReadyRule;
use crate::combinator::set::{forward_mux_protocol, range_set, IntoMuxSet, Mux, MuxSet};
use crate::combinator::MuxHelper;
use crate::error::Result;

/// Waits for the first child to finish.
#[derive(Debug)]
pub struct AnyOf<S: MuxSet> {
    mux: Mux<S>,
}

/// `AnyOf` over a homogeneous range.
pub type AnyOfRange<A> = AnyOf<Vec<std::rc::Rc<MuxHelper<A>>>>;

/// Runs every awaitable of the tuple concurrently and completes when the
/// first one does.
pub fn any_of<T: IntoMuxSet>(children: T) -> AnyOf<T::Set> {
    AnyOf {
        mux: Mux::new(children.into_mux_set(), ReadyRule::Any),
    }
}

/// Runs every awaitable of the range concurrently and completes when the
/// first one does.
pub fn any_of_range<I>(range: I) -> AnyOfRange<I::Item>
where
    I: IntoIterator,
    I::Item: Awaitable + 'static,
{
    AnyOf {
        mux: Mux::new(range_set(range), ReadyRule::Any),
    }
}

impl<S: MuxSet> AnyOf<S> {
    /// The underlying multiplexer.
    #[must_use]
    pub fn mux(&self) -> &Mux<S> {
        &self.mux
    }
}

impl<S: MuxSet> Awaitable for AnyOf<S> {
    type Output = S::Options;
    type Suspend = bool;

    const SKIPPABLE: bool = S::SKIPPABLE;
    const ABORTABLE: bool = S::ABORTABLE;

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
