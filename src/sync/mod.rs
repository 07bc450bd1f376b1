//! Synchronization primitives for tasks on one executor.
//!
//! - [`Event`]: one-shot trigger that any number of tasks can wait on
//!
//! Everything here is single-threaded: state lives behind `Rc` and `Cell`,
//! and waking a waiter resumes its frame directly.

mod event;

pub use event::{Event, EventWait};
