//! A back-pointer paired with a small tag.
//!
//! Multiplexer helpers keep a pointer to their owning multiplexer together
//! with their 3-bit lifecycle state. The crate forbids `unsafe`, so the tag is
//! never stashed in the pointer's alignment bits; the pair is always stored as
//! a plain two-field struct. [`PointerBits::WIDTH`] and [`PointerBits::MASK`]
//! still bound the tag so that every value written would fit a packed layout.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// A weak pointer to `T` plus a `W`-bit tag, for single-threaded use.
#[derive(Debug)]
pub struct PointerBits<T, const W: u32> {
    ptr: RefCell<Weak<T>>,
    bits: Cell<u8>,
}

impl<T, const W: u32> PointerBits<T, W> {
    /// Number of tag bits.
    pub const WIDTH: u32 = W;
    /// Mask of valid tag bits.
    pub const MASK: u8 = ((1_u16 << W) - 1) as u8;

    /// Creates a pair with a dangling pointer and the given tag.
    #[must_use]
    pub fn new(bits: u8) -> Self {
        debug_assert!(W <= 8, "tag width exceeds 8 bits");
        debug_assert_eq!(bits & !Self::MASK, 0, "tag does not fit in {W} bits");
        Self {
            ptr: RefCell::new(Weak::new()),
            bits: Cell::new(bits & Self::MASK),
        }
    }

    /// Returns the tag.
    #[must_use]
    pub fn bits(&self) -> u8 {
        self.bits.get()
    }

    /// Replaces the tag.
    pub fn set_bits(&self, bits: u8) {
        debug_assert_eq!(bits & !Self::MASK, 0, "tag does not fit in {W} bits");
        self.bits.set(bits & Self::MASK);
    }

    /// Points at `target`.
    pub fn set_ptr(&self, target: &Rc<T>) {
        *self.ptr.borrow_mut() = Rc::downgrade(target);
    }

    /// Returns true once a pointer has been installed and its target is alive.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.ptr.borrow().strong_count() > 0
    }

    /// Upgrades the pointer, if the target is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Rc<T>> {
        self.ptr.borrow().upgrade()
    }

    /// Returns true if a packed single-word layout would be possible for `T`.
    #[must_use]
    pub const fn could_pack() -> bool {
        std::mem::align_of::<T>() >= (1_usize << W)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_and_pointer_are_independent() {
        let target = Rc::new(41_u64);
        let pb: PointerBits<u64, 3> = PointerBits::new(0);
        assert!(!pb.is_bound());

        pb.set_ptr(&target);
        pb.set_bits(5);
        assert!(pb.is_bound());
        assert_eq!(pb.bits(), 5);
        assert_eq!(pb.upgrade().map(|r| *r), Some(41));
    }

    #[test]
    fn mask_matches_width() {
        assert_eq!(PointerBits::<u64, 3>::MASK, 0b111);
        assert_eq!(PointerBits::<u64, 1>::MASK, 0b1);
        assert!(PointerBits::<u64, 3>::could_pack());
        assert!(!PointerBits::<u8, 3>::could_pack());
    }

    #[test]
    fn pointer_does_not_keep_target_alive() {
        let pb: PointerBits<String, 3> = PointerBits::new(1);
        {
            let target = Rc::new(String::from("mux"));
            pb.set_ptr(&target);
            assert!(pb.is_bound());
        }
        assert!(pb.upgrade().is_none());
        assert_eq!(pb.bits(), 1);
    }
}
