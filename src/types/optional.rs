//! Uniform result container used by the multiplexer result slots.
//!
//! [`Optional<T>`] behaves like `Option<T>` for value types. For reference
//! types it relies on the null-pointer niche: `Optional<&T>` is exactly one
//! pointer wide and "empty" is the null sentinel, so slots holding borrowed
//! results cost no more than a raw pointer.
//!
//! Unlike `Option`, a slot is write-once: [`Optional::emplace`] on a filled
//! slot is a logic error (asserted in debug builds).

use core::fmt;

/// A write-once optional value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Optional<T> {
    inner: Option<T>,
}

impl<T> Optional<T> {
    /// Creates an empty slot.
    #[must_use]
    pub const fn none() -> Self {
        Self { inner: None }
    }

    /// Creates a filled slot.
    #[must_use]
    pub const fn some(value: T) -> Self {
        Self { inner: Some(value) }
    }

    /// Returns true if the slot holds a value.
    #[must_use]
    pub const fn has_value(&self) -> bool {
        self.inner.is_some()
    }

    /// Stores a value in an empty slot.
    pub fn emplace(&mut self, value: T) {
        debug_assert!(self.inner.is_none(), "Optional slot constructed twice");
        self.inner = Some(value);
    }

    /// Borrows the value, if any.
    #[must_use]
    pub const fn get(&self) -> Option<&T> {
        self.inner.as_ref()
    }

    /// Removes and returns the value, leaving the slot empty.
    pub fn take(&mut self) -> Option<T> {
        self.inner.take()
    }

    /// Destroys the value, if any.
    pub fn reset(&mut self) {
        self.inner = None;
    }

    /// Converts into a standard `Option`.
    #[must_use]
    pub fn into_option(self) -> Option<T> {
        self.inner
    }
}

impl<T> Default for Optional<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> From<Option<T>> for Optional<T> {
    fn from(inner: Option<T>) -> Self {
        Self { inner }
    }
}

impl<T> From<Optional<T>> for Option<T> {
    fn from(opt: Optional<T>) -> Self {
        opt.inner
    }
}

impl<T: fmt::Debug> fmt::Debug for Optional<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(v) => f.debug_tuple("Optional").field(v).finish(),
            None => f.write_str("Optional(<empty>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_variant_is_pointer_sized() {
        assert_eq!(
            std::mem::size_of::<Optional<&u64>>(),
            std::mem::size_of::<*const u64>()
        );
        let value = 5_u64;
        let slot = Optional::some(&value);
        assert_eq!(slot.get().copied(), Some(&5));
        assert!(!Optional::<&u64>::none().has_value());
    }

    #[test]
    fn emplace_take_reset() {
        let mut slot = Optional::none();
        slot.emplace(String::from("frame"));
        assert!(slot.has_value());
        assert_eq!(slot.take().as_deref(), Some("frame"));
        assert!(!slot.has_value());

        slot.emplace(String::from("again"));
        slot.reset();
        assert_eq!(slot.into_option(), None);
    }

    #[test]
    fn converts_to_and_from_option() {
        let slot: Optional<i32> = Some(3).into();
        let back: Option<i32> = slot.clone().into();
        assert_eq!(back, Some(3));
        assert_eq!(format!("{slot:?}"), "Optional(3)");
        assert_eq!(format!("{:?}", Optional::<i32>::none()), "Optional(<empty>)");
    }
}
