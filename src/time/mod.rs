//! Time primitives: sleep and timeout awaitables.
//!
//! - [`Sleep`]: completes once the executor clock reaches a deadline
//! - [`Timeout`]: races an awaitable against a sleep
//!
//! # Virtual vs Wall Time
//!
//! Both work against the executor clock. Under the virtual clock
//! ([`ClockMode::Virtual`](crate::runtime::ClockMode::Virtual)) an idle
//! executor jumps to the next deadline; under the real-time clock it sleeps
//! the thread until then.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use oxco::time::{sleep_for, timeout};
//!
//! let result = oxco::run(|cx| async move {
//!     cx.wait(timeout(Duration::from_secs(5), sleep_for(Duration::from_secs(1)))).await
//! });
//! assert!(result.is_ok());
//! ```

mod sleep;
mod timeout;

pub use sleep::{sleep_for, sleep_until, Sleep};
pub use timeout::{timeout, Timeout};
