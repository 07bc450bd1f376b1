//! Multiplexing combinators for structured concurrency.
//!
//! - [`any_of`](any_of()): run children concurrently, first to finish wins
//! - [`all_of`](all_of()): run children concurrently, every one must succeed
//! - [`most_of`](most_of()): run children concurrently, cancelled ones yield `None`
//!
//! Each has a `_range` variant over any `IntoIterator` of one awaitable type.
//!
//! All three are built on the same engine: a [`MuxCore`] that counts child
//! completions, keeps the first error, and resumes the parent exactly once
//! after every child reached a terminal state; and one [`MuxHelper`] frame
//! per child. The policies differ only in when the remaining children are
//! cancelled and in how the results are assembled.
//!
//! # Invariants
//!
//! - The parent is resumed exactly once, after every child is terminal.
//! - The first error wins and is re-raised; later errors are dropped.
//! - Children are bound and suspended in construction order; cancellation
//!   sweeps visit them in the same order.
//! - Cancellation guarantees compose: a combinator is skippable if every
//!   child is; `any_of` is abortable if every child is.

pub mod all_of;
pub mod any_of;
pub mod helper;
pub mod most_of;
pub mod mux;
pub mod set;

pub use all_of::{all_of, all_of_range, AllOf, AllOfRange};
pub use any_of::{any_of, any_of_range, AnyOf, AnyOfRange};
pub use helper::MuxHelper;
pub use most_of::{most_of, most_of_range, MostOf, MostOfRange};
pub use mux::{MuxChild, MuxCore, MuxListener, ReadyRule};
pub use set::{IntoMuxSet, Mux, MuxSet};
