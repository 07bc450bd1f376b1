//! Oxco: a single-threaded structured-concurrency runtime.
//!
//! # Overview
//!
//! Every asynchronous operation is an [`Awaitable`]: a small state machine
//! driven through a fixed suspend/resume/cancel protocol by its parent frame.
//! Tasks are `async` bodies that suspend only through their [`Cx`], and
//! combinators multiplex several awaitables under one parent.
//!
//! # Core Guarantees
//!
//! - **Exactly-once resume**: a parent is resumed once per suspension, never
//!   twice, and never after a synchronous cancel
//! - **Cancellation is a request**: an awaitable may refuse or defer it, and
//!   the value it produced anyway is never lost
//! - **No orphans**: combinators and nurseries complete only after every child
//!   is terminal
//! - **Deterministic by default**: a virtual clock and FIFO dispatch make runs
//!   reproducible
//!
//! # Module Structure
//!
//! - [`awaiter`]: the protocol, its sanitizer, and the trivial awaitables
//! - [`combinator`]: `any_of`, `all_of`, `most_of` and their range variants
//! - [`cx`]: tasks, the task context, and nurseries
//! - [`runtime`]: the executor, frames, and [`run`]
//! - [`time`]: sleeps and `timeout`
//! - [`sync`]: [`Event`]
//! - [`types`]: identifiers, virtual time, and small value types
//! - [`util`]: scope guards
//! - [`error`]: error types
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use oxco::{any_of, task};
//!
//! let winner = oxco::run(|cx| async move {
//!     let fast = task(|cx| async move {
//!         cx.sleep(Duration::from_millis(10)).await?;
//!         Ok("fast")
//!     });
//!     let slow = task(|cx| async move {
//!         cx.sleep(Duration::from_millis(50)).await?;
//!         Ok("slow")
//!     });
//!     let (a, b) = cx.wait(any_of((fast, slow))).await?;
//!     Ok(a.or(b))
//! });
//! assert_eq!(winner.unwrap(), Some("fast"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::result_large_err)]

pub mod awaiter;
pub mod combinator;
pub mod cx;
pub mod error;
pub mod runtime;
pub mod sync;
pub mod time;
pub mod tracing_compat;
pub mod types;
pub mod util;

#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

pub use awaiter::{Awaitable, Sanitized, SuspendResult};
pub use combinator::{
    all_of, all_of_range, any_of, any_of_range, most_of, most_of_range, AllOf, AnyOf, MostOf,
};
pub use cx::{task, Cx, Nursery, Task};
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use runtime::{run, ClockMode, Executor, Runtime, RuntimeBuilder, RuntimeConfig};
pub use sync::Event;
pub use time::{sleep_for, sleep_until, timeout};
pub use types::{TaskId, Time};
