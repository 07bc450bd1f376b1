//! Logging macros that compile away without `tracing-integration`.
//!
//! Runtime code imports `trace!`, `debug!`, `error!` and `debug_span!` from
//! here instead of from `tracing`. With the feature on these are the
//! `tracing` macros. With it off they accept the same syntax and expand to
//! nothing, and `debug_span!` yields a [`NoopSpan`].
//!
//! ```rust,ignore
//! use oxco::tracing_compat::{debug, debug_span};
//!
//! let _span = debug_span!("oxco.run", name = "frame").entered();
//! debug!(task = %id, "task suspended");
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, debug_span, error, trace};

#[cfg(not(feature = "tracing-integration"))]
mod disabled {
    #[doc(hidden)]
    #[macro_export]
    macro_rules! __oxco_trace {
        ($($arg:tt)*) => {
            ()
        };
    }

    #[doc(hidden)]
    #[macro_export]
    macro_rules! __oxco_debug {
        ($($arg:tt)*) => {
            ()
        };
    }

    #[doc(hidden)]
    #[macro_export]
    macro_rules! __oxco_error {
        ($($arg:tt)*) => {
            ()
        };
    }

    #[doc(hidden)]
    #[macro_export]
    macro_rules! __oxco_debug_span {
        ($($arg:tt)*) => {
            $crate::tracing_compat::NoopSpan
        };
    }

    pub use crate::{
        __oxco_debug as debug, __oxco_debug_span as debug_span, __oxco_error as error,
        __oxco_trace as trace,
    };
}

#[cfg(not(feature = "tracing-integration"))]
pub use disabled::{debug, debug_span, error, trace};

/// Stand-in for `tracing::Span` when logging is compiled out.
#[cfg(not(feature = "tracing-integration"))]
#[derive(Debug, Clone, Copy)]
pub struct NoopSpan;

#[cfg(not(feature = "tracing-integration"))]
impl NoopSpan {
    /// Mirrors `Span::entered`; the guard does nothing.
    #[inline]
    #[must_use]
    pub fn entered(self) -> Self {
        self
    }
}
