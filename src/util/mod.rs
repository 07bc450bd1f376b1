//! Internal utilities for the Oxco runtime.

pub mod scope_guard;

pub use scope_guard::{scope_guard, ScopeGuard};
