//! Child sets: fixed tuples and homogeneous ranges of awaitables.
//!
//! A [`MuxSet`] is the typed view of a multiplexer's children. Tuples of up
//! to eight awaitables and `Vec`s of one awaitable type are supported; both
//! wrap every child in a [`MuxHelper`] at construction, in order.

use std::rc::Rc;

use crate::awaiter::Awaitable;
use crate::combinator::helper::MuxHelper;
use crate::combinator::mux::{MuxChild, MuxCore, ReadyRule};

/// The typed children of a multiplexer.
pub trait MuxSet {
    /// One `Option` per child: `None` for children without a value.
    type Options;
    /// One value per child.
    type Values;

    /// Every child is skippable.
    const SKIPPABLE: bool;
    /// Every child is abortable.
    const ABORTABLE: bool;

    /// The erased children, in construction order.
    fn children(&self) -> Vec<Rc<dyn MuxChild>>;

    /// Moves every harvested value out.
    fn take_options(&self) -> Self::Options;

    /// Moves every harvested value out, or returns `None` if some child has
    /// no value.
    fn take_values(&self) -> Option<Self::Values>;
}

/// Conversion of a tuple or collection of awaitables into a [`MuxSet`].
pub trait IntoMuxSet {
    /// The resulting set.
    type Set: MuxSet;

    /// Wraps every awaitable in a helper.
    fn into_mux_set(self) -> Self::Set;
}

macro_rules! impl_mux_tuple {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: Awaitable + 'static),+> MuxSet for ($(Rc<MuxHelper<$name>>,)+) {
            type Options = ($(Option<$name::Output>,)+);
            type Values = ($($name::Output,)+);

            const SKIPPABLE: bool = true $(&& $name::SKIPPABLE)+;
            const ABORTABLE: bool = true $(&& $name::ABORTABLE)+;

            fn children(&self) -> Vec<Rc<dyn MuxChild>> {
                vec![$(Rc::clone(&self.$idx) as Rc<dyn MuxChild>),+]
            }

            fn take_options(&self) -> Self::Options {
                ($(self.$idx.take_result(),)+)
            }

            fn take_values(&self) -> Option<Self::Values> {
                Some(($(self.$idx.take_result()?,)+))
            }
        }

        impl<$($name: Awaitable + 'static),+> IntoMuxSet for ($($name,)+) {
            type Set = ($(Rc<MuxHelper<$name>>,)+);

            fn into_mux_set(self) -> Self::Set {
                ($(MuxHelper::new(self.$idx, $idx),)+)
            }
        }
    };
}

impl_mux_tuple!(A 0);
impl_mux_tuple!(A 0, B 1);
impl_mux_tuple!(A 0, B 1, C 2);
impl_mux_tuple!(A 0, B 1, C 2, D 3);
impl_mux_tuple!(A 0, B 1, C 2, D 3, E 4);
impl_mux_tuple!(A 0, B 1, C 2, D 3, E 4, F 5);
impl_mux_tuple!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_mux_tuple!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);

impl<A: Awaitable + 'static> MuxSet for Vec<Rc<MuxHelper<A>>> {
    type Options = Vec<Option<A::Output>>;
    type Values = Vec<A::Output>;

    const SKIPPABLE: bool = A::SKIPPABLE;
    const ABORTABLE: bool = A::ABORTABLE;

    fn children(&self) -> Vec<Rc<dyn MuxChild>> {
        self.iter()
            .map(|h| Rc::clone(h) as Rc<dyn MuxChild>)
            .collect()
    }

    fn take_options(&self) -> Self::Options {
        self.iter().map(|h| h.take_result()).collect()
    }

    fn take_values(&self) -> Option<Self::Values> {
        self.iter().map(|h| h.take_result()).collect()
    }
}

/// Wraps each element of a range in a helper.
pub(crate) fn range_set<I>(range: I) -> Vec<Rc<MuxHelper<I::Item>>>
where
    I: IntoIterator,
    I::Item: Awaitable + 'static,
{
    range
        .into_iter()
        .enumerate()
        .map(|(index, a)| MuxHelper::new(a, index))
        .collect()
}

/// A multiplexer: the shared core plus the typed children.
pub struct Mux<S: MuxSet> {
    core: Rc<MuxCore>,
    set: S,
}

impl<S: MuxSet> Mux<S> {
    pub(crate) fn new(set: S, rule: ReadyRule) -> Self {
        let core = MuxCore::new(rule);
        for child in set.children() {
            core.push(child);
        }
        Self { core, set }
    }

    /// The shared core.
    #[must_use]
    pub fn core(&self) -> &MuxCore {
        &self.core
    }

    /// The typed children.
    #[must_use]
    pub fn set(&self) -> &S {
        &self.set
    }
}

impl<S: MuxSet> std::fmt::Debug for Mux<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.core.fmt(f)
    }
}

/// Forwards the protocol hooks shared by every combinator to its [`Mux`].
macro_rules! forward_mux_protocol {
    () => {
        fn await_ready(&self) -> bool {
            self.mux.core().ready()
        }

        fn await_suspend(&mut self, parent: $crate::runtime::frame::Handle) -> bool {
            self.mux.core().suspend(parent)
        }

        fn await_early_cancel(&mut self) -> bool {
            self.mux.core().early_cancel()
        }

        fn await_cancel(&mut self, parent: $crate::runtime::frame::Handle) -> bool {
            self.mux.core().cancel(parent)
        }

        fn await_set_executor(&mut self, executor: &$crate::runtime::executor::Executor) {
            self.mux.core().set_executor(executor);
        }
    };
}

pub(crate) use forward_mux_protocol;
