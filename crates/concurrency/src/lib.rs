//! Conditional-update workflows for Tideline
//!
//! - [`AtomicCounter`]: bounded per-key counter with reset-on-conflict
//! - [`ReferenceCounter`]: at-most-once reply claiming
//!
//! Neither keeps in-process locks. Correctness rests on the store applying
//! each conditional update atomically.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod counter;
pub mod reference;

pub use counter::AtomicCounter;
pub use reference::{Message, Reply, ReferenceCounter};
