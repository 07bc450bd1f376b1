//! The executor, frames, and the runtime entry points.
//!
//! - [`frame`]: resumable frames and the weak [`Handle`]s that address them
//! - [`executor`]: the FIFO dispatcher of handles, with timers and a clock
//! - [`timer`]: the timer heap behind [`Executor::schedule_at`]
//! - [`waker`]: `Waker` support for foreign futures awaited inside tasks
//! - [`config`] / [`env_config`]: configuration values and their sources
//! - [`builder`]: [`RuntimeBuilder`], [`Runtime`] and [`run`]
//!
//! # Runtime Builder
//!
//! Each builder method consumes `self` and returns the updated builder.
//!
//! ```
//! use oxco::runtime::{ClockMode, RuntimeBuilder};
//!
//! let runtime = RuntimeBuilder::new()
//!     .clock(ClockMode::Virtual)
//!     .max_steps(10_000)
//!     .name("frame-loop")
//!     .build()
//!     .unwrap();
//! let v = runtime.run(|cx| async move {
//!     cx.yield_now().await?;
//!     Ok(1 + 1)
//! });
//! assert_eq!(v.unwrap(), 2);
//! ```
//!
//! ## Config File + Environment Overrides
//!
//! ```ignore
//! use oxco::runtime::RuntimeBuilder;
//!
//! // Requires the `config-file` feature.
//! let runtime = RuntimeBuilder::from_env()
//!     .config_file("config/oxco.toml")
//!     .build()?;
//! ```
//!
//! # Configuration Reference (Defaults + Notes)
//!
//! - `clock`: default = virtual. Virtual time jumps to the next deadline when
//!   the executor is idle, which makes runs deterministic.
//! - `max_steps`: default = unbounded. A bound turns a livelock into a
//!   [`StepLimit`](crate::error::ErrorKind::StepLimit) error.
//! - `name`: default = `oxco`. Attached to the run span.

pub mod builder;
pub mod config;
pub mod env_config;
pub mod executor;
pub mod frame;
pub mod timer;
pub mod waker;

pub use builder::{run, Runtime, RuntimeBuilder};
pub use config::{ClockMode, RuntimeConfig};
pub use executor::{AbandonToken, Executor, RunExit, StopHandle};
pub use frame::{Frame, FrameKind, FrameState, Handle, HandleKind, ProxyFrame};
