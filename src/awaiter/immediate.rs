//! Awaitables whose result is known up front.

use crate::awaiter::Awaitable;
use crate::error::{Error, Result};
use crate::runtime::frame::Handle;

/// Completes immediately with a value.
#[derive(Debug)]
pub struct Ready<T> {
    value: Option<T>,
}

/// Returns an awaitable that completes immediately with `value`.
pub fn ready<T>(value: T) -> Ready<T> {
    Ready { value: Some(value) }
}

impl<T> Awaitable for Ready<T> {
    type Output = T;
    type Suspend = bool;

    const SKIPPABLE: bool = true;
    const ABORTABLE: bool = true;
    const CANCEL_IS_CLEAN: bool = true;

    fn await_ready(&self) -> bool {
        true
    }

    fn await_suspend(&mut self, _parent: Handle) -> bool {
        false
    }

    fn await_resume(&mut self) -> Result<T> {
        self.value
            .take()
            .ok_or_else(|| Error::protocol("ready value resumed twice"))
    }
}

/// Completes immediately with an error.
#[derive(Debug)]
pub struct Fail<T> {
    error: Option<Error>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

/// Returns an awaitable that fails immediately with `error`.
pub fn fail<T>(error: Error) -> Fail<T> {
    Fail {
        error: Some(error),
        _marker: std::marker::PhantomData,
    }
}

impl<T> Awaitable for Fail<T> {
    type Output = T;
    type Suspend = bool;

    const SKIPPABLE: bool = true;
    const ABORTABLE: bool = true;
    const CANCEL_IS_CLEAN: bool = true;

    fn await_ready(&self) -> bool {
        true
    }

    fn await_suspend(&mut self, _parent: Handle) -> bool {
        false
    }

    fn await_resume(&mut self) -> Result<T> {
        Err(self
            .error
            .take()
            .unwrap_or_else(|| Error::protocol("failure resumed twice")))
    }
}
