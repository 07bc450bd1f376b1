//! Tasks, the task context, and nurseries.
//!
//! User code runs as `async` bodies that receive a [`Cx`]. The body suspends
//! only at `cx.wait(awaitable).await`; everything the runtime knows about
//! the task's parent, executor and cancellation flows through the `Cx`,
//! never through thread-local state.
//!
//! # Module Contents
//!
//! - [`Cx`]: the task context
//! - [`Task`] / [`task`]: an `async` body as an [`Awaitable`](crate::awaiter::Awaitable)
//! - [`Wait`]: the future returned by [`Cx::wait`]
//! - [`Nursery`]: a scope that starts child tasks and joins them on exit

#[allow(clippy::module_inception)]
pub mod cx;
pub mod nursery;
pub mod task;
pub mod wait;

pub use cx::Cx;
pub use nursery::{Nursery, NurseryJoin, NurseryScope};
pub use task::{task, Task};
pub use wait::Wait;

#[cfg(test)]
mod tests;
