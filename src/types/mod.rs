//! Core types for the Oxco runtime.
//!
//! - [`id`]: Identifier and clock types (`TaskId`, `TimerId`, `Time`)
//! - [`optional`]: Write-once result slot with a pointer-sized reference form
//! - [`pointer_bits`]: Back-pointer plus small tag, used by multiplexer helpers

pub mod id;
pub mod optional;
pub mod pointer_bits;

pub use id::{TaskId, Time, TimerId};
pub use optional::Optional;
pub use pointer_bits::PointerBits;
